//! Speech session token issuance
//!
//! The browser never sees the vendor credentials. It asks us for a short-lived
//! access token, obtained through the vendor's OAuth client-credentials flow.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TOKEN_URL: &str = "https://api.hume.ai/oauth2-cc/token";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Speech vendor credentials are not configured")]
    MissingCredentials,
    #[error("Token request failed: {0}")]
    Request(String),
    #[error("Token endpoint returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Token response did not contain an access token")]
    EmptyToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub struct SpeechTokenClient {
    client: Client,
    api_key: Option<String>,
    secret_key: Option<String>,
    token_url: String,
}

impl SpeechTokenClient {
    pub fn new(api_key: Option<String>, secret_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            secret_key: secret_key.filter(|k| !k.is_empty()),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.secret_key.is_some()
    }

    pub async fn fetch_access_token(&self) -> Result<String, TokenError> {
        let (Some(api_key), Some(secret_key)) = (&self.api_key, &self.secret_key) else {
            return Err(TokenError::MissingCredentials);
        };

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(api_key, Some(secret_key))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| TokenError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TokenError::Request(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(TokenError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| TokenError::Request(format!("Failed to parse response: {e}")))?;

        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::EmptyToken)?;

        tracing::debug!(expires_in = ?parsed.expires_in, "Issued speech session token");
        Ok(token)
    }
}
