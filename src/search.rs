//! Trademark search against the tmsearch.ai API
//!
//! The client fetches raw hits, [`types`] normalises them into [`Trademark`]s,
//! and [`summary`] turns a filtered result list into a risk assessment the
//! assistant can read back.

mod client;
mod rate_limit;
mod summary;
mod types;

pub use client::{sanitize_keyword, SearchFilters, TmSearchClient};
pub use rate_limit::{RateDecision, SearchRateLimiter};
pub use summary::{summarize, Conflict, RiskLevel, SearchSummary, MAX_RESULTS};
pub use types::{office_name, SearchResults, Trademark, TrademarkStatus};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A search request as issued by the assistant or the search page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub term: String,
    /// Office / country codes, e.g. `DE`, `EU`
    pub countries: Vec<String>,
    /// Nice classes; empty means all
    pub classes: Vec<u8>,
}

impl SearchQuery {
    pub const DEFAULT_COUNTRY: &'static str = "DE";

    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into().trim().to_string(),
            countries: vec![Self::DEFAULT_COUNTRY.to_string()],
            classes: Vec::new(),
        }
    }

    pub fn with_countries(mut self, countries: Vec<String>) -> Self {
        let countries: Vec<String> = countries
            .into_iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        if !countries.is_empty() {
            self.countries = countries;
        }
        self
    }

    pub fn with_classes(mut self, classes: Vec<u8>) -> Self {
        self.classes = classes;
        self
    }
}

/// Search error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SearchError {
    pub kind: SearchErrorKind,
    pub message: String,
}

impl SearchError {
    pub fn new(kind: SearchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::InvalidQuery, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::Network, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::Upstream, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::RateLimited, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchErrorKind {
    /// Empty or unusable search term
    InvalidQuery,
    /// Connection failure or timeout
    Network,
    /// Non-success status or unparseable body from the API
    Upstream,
    /// Local per-user search quota exhausted
    RateLimited,
}
