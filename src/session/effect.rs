//! Effects produced by state transitions

use super::event::Role;
use serde_json::Value;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the browser to open the vendor connection with this token
    OpenConnection { token: String },

    /// Ask the browser to close the vendor connection
    CloseConnection,

    /// Fire `ReconnectTimer { attempt }` after `delay`
    ScheduleReconnect { delay: Duration, attempt: u32 },

    /// Fetch a fresh vendor token, then fire `TokenRefreshed`
    RefreshToken { attempt: u32 },

    /// Run the trademark search (spawns as background task)
    RunSearch { brand: String },

    /// Abort the currently running search
    CancelSearch,

    /// Inject text into the live conversation as context for the agent
    SendContext { text: String },

    /// Record a line the browser already shows
    RecordMessage { role: Role, text: String },

    /// Add a server-originated line to the transcript and show it
    AppendTranscript { role: Role, text: String },

    /// The session is over; flush and finalize the transcript
    EndSession,

    /// Notify connected clients
    NotifyClient { event_type: String, data: Value },
}

impl Effect {
    #[allow(clippy::needless_pass_by_value)] // data is consumed by json! macro
    pub fn notify_state_change(state: &str, data: Value) -> Self {
        Effect::NotifyClient {
            event_type: "state_change".to_string(),
            data: serde_json::json!({
                "state": state,
                "state_data": data
            }),
        }
    }

    pub fn notify_search(status: &str, brand: &str) -> Self {
        Effect::NotifyClient {
            event_type: "search".to_string(),
            data: serde_json::json!({
                "status": status,
                "brand": brand
            }),
        }
    }

    pub fn assistant_line(text: impl Into<String>) -> Self {
        Effect::AppendTranscript {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}
