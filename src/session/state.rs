//! Session state types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection lifecycle of the speech session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the reconnect delay before attempt `attempt`
    Reconnecting { attempt: u32 },
}

impl ConnectionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Reconnecting { .. } => "reconnecting",
        }
    }

    /// Whether the vendor socket may currently be open
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionPhase::Connecting | ConnectionPhase::Connected)
    }
}

/// Progress of an assistant-offered search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchPhase {
    #[default]
    Idle,
    /// The assistant offered to search for `brand` and awaits an answer
    OfferPending { brand: String },
    /// A search is running; further confirmations are ignored
    Searching { brand: String },
}

impl SearchPhase {
    pub fn is_busy(&self) -> bool {
        matches!(self, SearchPhase::Searching { .. })
    }
}

/// Full controller state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionState {
    pub connection: ConnectionPhase,
    pub search: SearchPhase,
    /// Reconnect attempts made since the last successful open
    pub reconnect_attempts: u32,
    pub was_connected: bool,
    /// Set by an explicit stop; suppresses auto-reconnect
    pub stopped: bool,
    #[serde(skip)]
    pub last_token: Option<String>,
}

/// Immutable per-session settings
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub case_id: Option<String>,
    /// Brand used when an offer names none
    pub trademark_name: Option<String>,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            case_id: None,
            trademark_name: None,
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(2000),
        }
    }

    pub fn with_case(mut self, case_id: Option<String>, trademark_name: Option<String>) -> Self {
        self.case_id = case_id;
        self.trademark_name = trademark_name;
        self
    }

    pub fn with_reconnect(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self.reconnect_delay = delay;
        self
    }
}
