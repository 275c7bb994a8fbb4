//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::consultation::{self, ConsultationUpdate};
use crate::db::Database;
use crate::llm::LlmService;
use crate::search::{
    summarize, SearchError, SearchFilters, SearchQuery, SearchRateLimiter, SearchSummary,
    TmSearchClient,
};
use crate::session::transcript::TranscriptMessage;
use crate::token::{SpeechTokenClient, TokenError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Source of speech vendor access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<String, TokenError>;
}

/// Trademark search on behalf of a session
#[async_trait]
pub trait TrademarkSearch: Send + Sync {
    /// `requester` identifies whose search quota is charged
    async fn search(&self, requester: &str, query: &SearchQuery)
        -> Result<SearchSummary, SearchError>;
}

/// Destination of forwarded transcript lines
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Append newly paired lines
    async fn append(&self, session_id: &str, lines: &[TranscriptMessage]) -> Result<(), String>;

    /// The conversation ended; finalize the record
    async fn finish(&self, session_id: &str, duration: Duration) -> Result<(), String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        (**self).fetch_token().await
    }
}

#[async_trait]
impl<T: TrademarkSearch + ?Sized> TrademarkSearch for Arc<T> {
    async fn search(
        &self,
        requester: &str,
        query: &SearchQuery,
    ) -> Result<SearchSummary, SearchError> {
        (**self).search(requester, query).await
    }
}

#[async_trait]
impl<T: TranscriptSink + ?Sized> TranscriptSink for Arc<T> {
    async fn append(&self, session_id: &str, lines: &[TranscriptMessage]) -> Result<(), String> {
        (**self).append(session_id, lines).await
    }

    async fn finish(&self, session_id: &str, duration: Duration) -> Result<(), String> {
        (**self).finish(session_id, duration).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl TokenSource for SpeechTokenClient {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        self.fetch_access_token().await
    }
}

/// Adapter running filtered tmsearch queries under a per-requester quota
pub struct TmSearchService {
    client: TmSearchClient,
    limiter: Arc<SearchRateLimiter>,
}

impl TmSearchService {
    pub fn new(client: TmSearchClient, limiter: Arc<SearchRateLimiter>) -> Self {
        Self { client, limiter }
    }
}

#[async_trait]
impl TrademarkSearch for TmSearchService {
    async fn search(
        &self,
        requester: &str,
        query: &SearchQuery,
    ) -> Result<SearchSummary, SearchError> {
        if query.term.is_empty() {
            return Err(SearchError::invalid_query("Search term is required"));
        }
        if !self.limiter.check(requester).is_allowed() {
            return Err(SearchError::rate_limited(
                "Search limit reached. At most 5 searches per hour are allowed.",
            ));
        }

        let filters = SearchFilters {
            offices: query.countries.clone(),
            classes: query.classes.clone(),
            ..SearchFilters::default()
        };
        let results = self.client.search_with_filters(&query.term, &filters).await?;
        Ok(summarize(&query.term, &results.results))
    }
}

/// Adapter recording a session into its consultation row
pub struct ConsultationRecorder {
    db: Database,
    llm: Option<Arc<dyn LlmService>>,
    summary_timeout: Duration,
}

impl ConsultationRecorder {
    pub fn new(db: Database, llm: Option<Arc<dyn LlmService>>) -> Self {
        Self {
            db,
            llm,
            summary_timeout: Duration::from_secs(20),
        }
    }
}

#[async_trait]
impl TranscriptSink for ConsultationRecorder {
    async fn append(&self, session_id: &str, lines: &[TranscriptMessage]) -> Result<(), String> {
        if lines.is_empty() {
            return Ok(());
        }
        let text = consultation::format_transcript(lines);
        self.db
            .append_consultation_transcript(session_id, &text)
            .map_err(|e| e.to_string())
    }

    async fn finish(&self, session_id: &str, duration: Duration) -> Result<(), String> {
        let record = self
            .db
            .get_consultation(session_id)
            .map_err(|e| e.to_string())?;

        let triggers = consultation::extract_triggers(&record.transcript);
        let summary = consultation::generate_summary(
            self.llm.as_deref(),
            &record.transcript,
            &triggers,
            self.summary_timeout,
        )
        .await;

        let title = if consultation::is_generated_title(&record.title) {
            let generated = match self.llm.as_deref() {
                Some(llm) => consultation::generate_title(llm, &summary).await,
                None => None,
            };
            Some(generated.unwrap_or_else(|| consultation::fallback_title(&triggers)))
        } else {
            None
        };

        let update = ConsultationUpdate {
            title,
            summary: Some(summary),
            duration_secs: Some(duration.as_secs()),
            status: Some(consultation::ConsultationStatus::Completed),
            trademark_name: triggers.trademark_name,
            countries: (!triggers.countries.is_empty()).then_some(triggers.countries),
            nice_classes: (!triggers.nice_classes.is_empty()).then_some(triggers.nice_classes),
            ..ConsultationUpdate::default()
        };
        let record = self
            .db
            .update_consultation(session_id, &update)
            .map_err(|e| e.to_string())?;
        self.db
            .record_consultation_completed(&record)
            .map_err(|e| e.to_string())
    }
}
