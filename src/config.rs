//! Startup configuration from environment variables

use crate::runtime::SessionSettings;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: String,
    pub tmsearch_api_key: Option<String>,
    pub tmsearch_base_url: Option<String>,
    pub hume_api_key: Option<String>,
    pub hume_secret_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub transcript_debounce: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = SessionSettings::default();

        let db_path = get("TRADEMARK_DESK_DB_PATH").unwrap_or_else(|| {
            let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.trademark-desk/desk.db")
        });

        Self {
            port: get("TRADEMARK_DESK_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            db_path,
            tmsearch_api_key: get("TMSEARCH_API_KEY"),
            tmsearch_base_url: get("TMSEARCH_BASE_URL"),
            hume_api_key: get("HUME_API_KEY"),
            hume_secret_key: get("HUME_SECRET_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_base_url: get("OPENAI_BASE_URL"),
            reconnect_attempts: get("SESSION_RECONNECT_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_reconnect_attempts),
            reconnect_delay: get("SESSION_RECONNECT_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.reconnect_delay, Duration::from_millis),
            transcript_debounce: get("TRANSCRIPT_DEBOUNCE_MS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.transcript_debounce, Duration::from_millis),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_reconnect_attempts: self.reconnect_attempts,
            reconnect_delay: self.reconnect_delay,
            transcript_debounce: self.transcript_debounce,
        }
    }
}
