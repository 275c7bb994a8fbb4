//! HTTP client for tmsearch.ai

use super::types::{RawSearchResponse, SearchResults, Trademark, TrademarkStatus, EU_COUNTRIES};
use super::SearchError;
use reqwest::{Client, Url};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://tmsearch.ai/api";
/// Public test key; limited to a few hundred results
const TEST_API_KEY: &str = "TESTAPIKEY";

/// Keep letters, digits and whitespace; the API rejects punctuation
pub fn sanitize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Local filters applied to the raw hit list
#[derive(Debug, Clone)]
pub struct SearchFilters {
    /// `None` keeps every status
    pub status: Option<TrademarkStatus>,
    pub classes: Vec<u8>,
    pub offices: Vec<String>,
    pub min_accuracy: u8,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            status: Some(TrademarkStatus::Active),
            classes: Vec::new(),
            offices: Vec::new(),
            min_accuracy: 60,
        }
    }
}

impl SearchFilters {
    pub fn matches(&self, tm: &Trademark) -> bool {
        if let Some(status) = self.status {
            if tm.status != status {
                return false;
            }
        }
        if !self.classes.is_empty() && !tm.nice_classes.iter().any(|c| self.classes.contains(c)) {
            return false;
        }
        if !self.offices.is_empty() && !self.office_matches(tm) {
            return false;
        }
        tm.accuracy >= self.min_accuracy
    }

    /// Direct office match, EUIPO marks for EU member states, and WIPO marks
    /// designating a selected country (or the EU, for EU member states)
    fn office_matches(&self, tm: &Trademark) -> bool {
        let selected = |code: &str| self.offices.iter().any(|o| o == code);
        let has_eu_country = self.offices.iter().any(|o| EU_COUNTRIES.contains(&o.as_str()));

        if selected(&tm.office) {
            return true;
        }
        if has_eu_country && tm.office == "EU" {
            return true;
        }
        if tm.office == "WO" {
            return tm
                .designation_countries
                .iter()
                .any(|c| selected(c) || (has_eu_country && c == "EU"));
        }
        false
    }
}

pub struct TmSearchClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmSearchClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty()).unwrap_or_else(|| {
            tracing::info!("Using tmsearch.ai test API key (limited result set)");
            TEST_API_KEY.to_string()
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn is_test_mode(&self) -> bool {
        self.api_key == TEST_API_KEY
    }

    /// Raw keyword search; an unusable keyword yields an empty result
    pub async fn search(&self, keyword: &str) -> Result<SearchResults, SearchError> {
        let keyword = sanitize_keyword(keyword);
        if keyword.is_empty() {
            return Ok(SearchResults::default());
        }

        let url = Url::parse_with_params(
            &format!("{}/search/", self.base_url),
            &[("keyword", keyword.as_str()), ("api_key", self.api_key.as_str())],
        )
        .map_err(|e| SearchError::invalid_query(format!("Invalid search URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::network(format!("Request timeout: {e}"))
                } else {
                    SearchError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(SearchError::upstream(format!("HTTP {status}: {body}")));
        }

        let raw: RawSearchResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::upstream(format!("Failed to parse response: {e}")))?;

        Ok(SearchResults {
            total: raw.total,
            results: raw.result.into_iter().map(Trademark::from).collect(),
            filtered: 0,
        })
    }

    pub async fn search_with_filters(
        &self,
        keyword: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResults, SearchError> {
        let SearchResults { total, results, .. } = self.search(keyword).await?;
        let before = results.len();
        let results: Vec<Trademark> = results.into_iter().filter(|tm| filters.matches(tm)).collect();

        tracing::debug!(
            keyword = %keyword,
            total,
            kept = results.len(),
            offices = ?filters.offices,
            "tmsearch results filtered"
        );

        Ok(SearchResults {
            total,
            filtered: before - results.len(),
            results,
        })
    }
}
