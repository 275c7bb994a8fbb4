//! Events that can occur in a session

use serde::{Deserialize, Serialize};

/// Speaker of a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Result of a search run on behalf of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Formatted result, ready to be read back
    Found(String),
    Failed(String),
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Browser events
    Connect {
        token: String,
    },
    ConnectionOpened,
    ConnectionClosed {
        #[serde(default)]
        reason: Option<String>,
    },
    Stop,
    AgentMessage {
        text: String,
    },
    UserMessage {
        text: String,
    },

    // Runtime events
    #[serde(skip)]
    ReconnectTimer {
        attempt: u32,
    },
    #[serde(skip)]
    TokenRefreshed {
        attempt: u32,
        token: Option<String>,
    },
    #[serde(skip)]
    SearchFinished {
        brand: String,
        outcome: SearchOutcome,
    },
}

impl Event {
    /// Whether the browser is allowed to submit this event
    pub fn is_client_event(&self) -> bool {
        !matches!(
            self,
            Event::ReconnectTimer { .. } | Event::TokenRefreshed { .. } | Event::SearchFinished { .. }
        )
    }
}
