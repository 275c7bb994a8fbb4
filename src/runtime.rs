//! Runtime for live conversation sessions
//!
//! One task per session runs the controller loop. The browser feeds it events
//! over HTTP and receives commands and transcript lines over SSE.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::session::{Event, Role, SessionContext, SessionState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with boxed adapters
pub type ProductionRuntime = SessionRuntime<
    Arc<dyn TokenSource>,
    Arc<dyn TrademarkSearch>,
    Arc<dyn TranscriptSink>,
>;

/// Tunables shared by all sessions
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub transcript_debounce: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(2000),
            transcript_debounce: Duration::from_millis(800),
        }
    }
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SessionEvent>,
    pub state_rx: watch::Receiver<SessionState>,
    pub context: SessionContext,
    shutdown: CancellationToken,
}

/// What the browser must do with its vendor connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    Open { token: String },
    Close,
    /// Inject text into the live conversation
    SendContext { text: String },
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Init {
        session_id: String,
        case_id: Option<String>,
        state: serde_json::Value,
    },
    StateChange {
        state: serde_json::Value,
    },
    Command {
        command: ClientCommand,
    },
    /// Server-originated transcript line
    Transcript {
        role: Role,
        text: String,
    },
    Search {
        data: serde_json::Value,
    },
    Ended,
    Error {
        message: String,
    },
}

/// Manager for all session runtimes
pub struct SessionManager {
    tokens: Arc<dyn TokenSource>,
    search: Arc<dyn TrademarkSearch>,
    sink: Arc<dyn TranscriptSink>,
    settings: SessionSettings,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        search: Arc<dyn TrademarkSearch>,
        sink: Arc<dyn TranscriptSink>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            tokens,
            search,
            sink,
            settings,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Start a runtime for `session_id`; an existing one is returned as is
    pub async fn start(
        &self,
        session_id: &str,
        case_id: Option<String>,
        trademark_name: Option<String>,
    ) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(session_id) {
            return handle.clone();
        }

        let context = SessionContext::new(session_id)
            .with_case(case_id, trademark_name)
            .with_reconnect(
                self.settings.max_reconnect_attempts,
                self.settings.reconnect_delay,
            );

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            context.clone(),
            self.tokens.clone(),
            self.search.clone(),
            self.sink.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            state_tx,
            shutdown.clone(),
            self.settings.transcript_debounce,
        );

        // A finished runtime drops its own entry, unless a newer one took the id
        let id = session_id.to_string();
        let sessions_ref = self.sessions.clone();
        let own_tx = event_tx.clone();
        tokio::spawn(async move {
            runtime.run().await;
            let mut sessions = sessions_ref.write().await;
            if sessions
                .get(&id)
                .is_some_and(|h| h.event_tx.same_channel(&own_tx))
            {
                sessions.remove(&id);
            }
            tracing::info!(session_id = %id, "Session runtime finished");
        });

        let handle = SessionHandle {
            event_tx,
            broadcast_tx,
            state_rx,
            context,
            shutdown,
        };

        sessions.insert(session_id.to_string(), handle.clone());
        handle
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Send an event to a session
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), String> {
        let handle = self
            .get(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {session_id}"))?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Subscribe to session updates
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Option<(SessionEvent, broadcast::Receiver<SessionEvent>)> {
        let handle = self.get(session_id).await?;
        let rx = handle.broadcast_tx.subscribe();
        let state = serde_json::to_value(&*handle.state_rx.borrow()).unwrap_or_default();
        let init = SessionEvent::Init {
            session_id: handle.context.session_id.clone(),
            case_id: handle.context.case_id.clone(),
            state,
        };
        Some((init, rx))
    }

    /// Stop a session's runtime and forget it. A live conversation is
    /// finalized; otherwise pending transcript lines are flushed.
    pub async fn close(&self, session_id: &str) -> bool {
        match self.sessions.write().await.remove(session_id) {
            Some(handle) => {
                handle.shutdown.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}
