//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same new
//! state and effects. Timers, token fetches and searches happen in the runtime
//! and come back as events.

use super::detect::{detect_offer, is_confirmation};
use super::{ConnectionPhase, Effect, Event, Role, SearchOutcome, SearchPhase, SessionContext, SessionState};
use serde_json::json;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// No state change, no effects
    pub fn unchanged(state: &SessionState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Session is already {0}; stop it before connecting again")]
    AlreadyActive(&'static str),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

const APOLOGY: &str = "Sorry, the trademark search could not be completed right now. \
Please try again in a moment or start it from the search page.";

pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Connect { token } => connect(state, token),
        Event::ConnectionOpened => Ok(connection_opened(state)),
        Event::ConnectionClosed { reason } => Ok(connection_closed(state, context, reason)),
        Event::ReconnectTimer { attempt } => Ok(reconnect_timer(state, attempt)),
        Event::TokenRefreshed { attempt, token } => Ok(token_refreshed(state, attempt, token)),
        Event::Stop => Ok(stop(state)),
        Event::AgentMessage { text } => Ok(agent_message(state, context, text)),
        Event::UserMessage { text } => Ok(user_message(state, text)),
        Event::SearchFinished { brand, outcome } => Ok(search_finished(state, &brand, outcome)),
    }
}

// ============================================================
// Connection lifecycle
// ============================================================

fn connect(state: &SessionState, token: String) -> Result<TransitionResult, TransitionError> {
    if state.connection != ConnectionPhase::Disconnected {
        return Err(TransitionError::AlreadyActive(state.connection.name()));
    }
    if token.trim().is_empty() {
        return Err(TransitionError::InvalidTransition(
            "connect requires a session token".to_string(),
        ));
    }

    let new_state = SessionState {
        connection: ConnectionPhase::Connecting,
        reconnect_attempts: 0,
        stopped: false,
        last_token: Some(token.clone()),
        ..state.clone()
    };
    Ok(TransitionResult::new(new_state)
        .with_effect(Effect::OpenConnection { token })
        .with_effect(Effect::notify_state_change("connecting", json!({}))))
}

fn connection_opened(state: &SessionState) -> TransitionResult {
    match state.connection {
        ConnectionPhase::Connecting => {
            let new_state = SessionState {
                connection: ConnectionPhase::Connected,
                reconnect_attempts: 0,
                was_connected: true,
                ..state.clone()
            };
            TransitionResult::new(new_state)
                .with_effect(Effect::notify_state_change("connected", json!({})))
        }
        // A late open after stop: close it again
        ConnectionPhase::Disconnected if state.stopped => {
            TransitionResult::unchanged(state).with_effect(Effect::CloseConnection)
        }
        _ => TransitionResult::unchanged(state),
    }
}

fn connection_closed(
    state: &SessionState,
    context: &SessionContext,
    reason: Option<String>,
) -> TransitionResult {
    if !state.connection.is_open() {
        return TransitionResult::unchanged(state);
    }

    let may_reconnect = !state.stopped
        && state.was_connected
        && state.reconnect_attempts < context.max_reconnect_attempts;

    if may_reconnect {
        let attempt = state.reconnect_attempts + 1;
        let new_state = SessionState {
            connection: ConnectionPhase::Reconnecting { attempt },
            reconnect_attempts: attempt,
            ..state.clone()
        };
        return TransitionResult::new(new_state)
            .with_effect(Effect::ScheduleReconnect {
                delay: context.reconnect_delay,
                attempt,
            })
            .with_effect(Effect::notify_state_change(
                "reconnecting",
                json!({
                    "attempt": attempt,
                    "max_attempts": context.max_reconnect_attempts,
                    "reason": reason,
                }),
            ));
    }

    end_session(state, reason)
}

fn reconnect_timer(state: &SessionState, attempt: u32) -> TransitionResult {
    match state.connection {
        ConnectionPhase::Reconnecting { attempt: current } if current == attempt => {
            TransitionResult::unchanged(state).with_effect(Effect::RefreshToken { attempt })
        }
        // Stale timer from a cancelled reconnect
        _ => TransitionResult::unchanged(state),
    }
}

fn token_refreshed(state: &SessionState, attempt: u32, token: Option<String>) -> TransitionResult {
    match state.connection {
        ConnectionPhase::Reconnecting { attempt: current } if current == attempt => {
            let Some(token) = token.or_else(|| state.last_token.clone()) else {
                return end_session(state, Some("no session token available".to_string()));
            };
            let new_state = SessionState {
                connection: ConnectionPhase::Connecting,
                last_token: Some(token.clone()),
                ..state.clone()
            };
            TransitionResult::new(new_state)
                .with_effect(Effect::OpenConnection { token })
                .with_effect(Effect::notify_state_change(
                    "connecting",
                    json!({ "attempt": attempt }),
                ))
        }
        _ => TransitionResult::unchanged(state),
    }
}

fn stop(state: &SessionState) -> TransitionResult {
    let mut effects = Vec::new();
    if state.connection.is_open() {
        effects.push(Effect::CloseConnection);
    }
    if state.search.is_busy() {
        effects.push(Effect::CancelSearch);
    }
    let ended = state.was_connected;

    let new_state = SessionState {
        connection: ConnectionPhase::Disconnected,
        search: SearchPhase::Idle,
        was_connected: false,
        stopped: true,
        ..state.clone()
    };

    let mut result = TransitionResult::new(new_state).with_effects(effects);
    if ended {
        result = result.with_effect(Effect::EndSession);
    }
    result.with_effect(Effect::notify_state_change(
        "disconnected",
        json!({ "reason": "stopped" }),
    ))
}

/// Final disconnect: no (more) reconnect attempts
fn end_session(state: &SessionState, reason: Option<String>) -> TransitionResult {
    let ended = state.was_connected;
    let mut effects = Vec::new();
    if state.search.is_busy() {
        effects.push(Effect::CancelSearch);
    }

    let new_state = SessionState {
        connection: ConnectionPhase::Disconnected,
        search: SearchPhase::Idle,
        was_connected: false,
        ..state.clone()
    };

    let mut result = TransitionResult::new(new_state).with_effects(effects);
    if ended {
        result = result.with_effect(Effect::EndSession);
    }
    result.with_effect(Effect::notify_state_change(
        "disconnected",
        json!({
            "reason": reason,
            "reconnect_attempts": state.reconnect_attempts,
        }),
    ))
}

// ============================================================
// Transcript handling
// ============================================================

fn agent_message(state: &SessionState, context: &SessionContext, text: String) -> TransitionResult {
    let offer = if state.search.is_busy() {
        None
    } else {
        detect_offer(&text, context.trademark_name.as_deref())
    };

    let mut result = match offer {
        Some(brand) => {
            let notify = Effect::notify_search("offered", &brand);
            TransitionResult::new(SessionState {
                search: SearchPhase::OfferPending { brand },
                ..state.clone()
            })
            .with_effect(notify)
        }
        None => TransitionResult::unchanged(state),
    };

    result.effects.insert(
        0,
        Effect::RecordMessage {
            role: Role::Assistant,
            text,
        },
    );
    result
}

fn user_message(state: &SessionState, text: String) -> TransitionResult {
    let confirmed = is_confirmation(&text);
    let record = Effect::RecordMessage {
        role: Role::User,
        text,
    };

    match &state.search {
        SearchPhase::OfferPending { brand } if confirmed => {
            let brand = brand.clone();
            TransitionResult::new(SessionState {
                search: SearchPhase::Searching {
                    brand: brand.clone(),
                },
                ..state.clone()
            })
            .with_effect(record)
            .with_effect(Effect::notify_search("started", &brand))
            .with_effect(Effect::RunSearch { brand })
        }
        SearchPhase::OfferPending { brand } => {
            let notify = Effect::notify_search("declined", brand);
            TransitionResult::new(SessionState {
                search: SearchPhase::Idle,
                ..state.clone()
            })
            .with_effect(record)
            .with_effect(notify)
        }
        SearchPhase::Idle | SearchPhase::Searching { .. } => {
            TransitionResult::unchanged(state).with_effect(record)
        }
    }
}

fn search_finished(state: &SessionState, brand: &str, outcome: SearchOutcome) -> TransitionResult {
    match &state.search {
        SearchPhase::Searching { brand: running } if running == brand => {
            let new_state = SessionState {
                search: SearchPhase::Idle,
                ..state.clone()
            };
            match outcome {
                SearchOutcome::Found(text) => TransitionResult::new(new_state)
                    .with_effect(Effect::assistant_line(text.clone()))
                    .with_effect(Effect::SendContext { text })
                    .with_effect(Effect::notify_search("completed", brand)),
                SearchOutcome::Failed(message) => {
                    tracing::warn!(brand = %brand, error = %message, "Assistant search failed");
                    TransitionResult::new(new_state)
                        .with_effect(Effect::assistant_line(APOLOGY))
                        .with_effect(Effect::notify_search("failed", brand))
                }
            }
        }
        // Result of a cancelled or superseded search
        _ => TransitionResult::unchanged(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx() -> SessionContext {
        SessionContext::new("s-1").with_reconnect(3, Duration::from_millis(2000))
    }

    fn step(state: &SessionState, event: Event) -> TransitionResult {
        transition(state, &ctx(), event).unwrap()
    }

    fn connected() -> SessionState {
        let s = step(
            &SessionState::default(),
            Event::Connect {
                token: "tok-1".to_string(),
            },
        )
        .new_state;
        step(&s, Event::ConnectionOpened).new_state
    }

    fn has_effect(result: &TransitionResult, pred: impl Fn(&Effect) -> bool) -> bool {
        result.effects.iter().any(pred)
    }

    #[test]
    fn test_connect_opens_connection() {
        let result = step(
            &SessionState::default(),
            Event::Connect {
                token: "tok-1".to_string(),
            },
        );
        assert_eq!(result.new_state.connection, ConnectionPhase::Connecting);
        assert!(has_effect(&result, |e| matches!(e, Effect::OpenConnection { token } if token == "tok-1")));
    }

    #[test]
    fn test_connect_rejected_while_connected() {
        let err = transition(
            &connected(),
            &ctx(),
            Event::Connect {
                token: "tok-2".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::AlreadyActive("connected"));
    }

    #[test]
    fn test_connect_requires_token() {
        let err = transition(
            &SessionState::default(),
            &ctx(),
            Event::Connect {
                token: "  ".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn test_unexpected_close_schedules_reconnect() {
        let result = step(&connected(), Event::ConnectionClosed { reason: None });
        assert_eq!(
            result.new_state.connection,
            ConnectionPhase::Reconnecting { attempt: 1 }
        );
        assert!(has_effect(&result, |e| matches!(
            e,
            Effect::ScheduleReconnect { attempt: 1, delay } if *delay == Duration::from_millis(2000)
        )));
    }

    #[test]
    fn test_reconnect_fetches_fresh_token_then_reconnects() {
        let s = step(&connected(), Event::ConnectionClosed { reason: None }).new_state;

        let timer = step(&s, Event::ReconnectTimer { attempt: 1 });
        assert!(has_effect(&timer, |e| matches!(e, Effect::RefreshToken { attempt: 1 })));

        let refreshed = step(
            &timer.new_state,
            Event::TokenRefreshed {
                attempt: 1,
                token: Some("tok-fresh".to_string()),
            },
        );
        assert_eq!(refreshed.new_state.connection, ConnectionPhase::Connecting);
        assert!(has_effect(&refreshed, |e| matches!(e, Effect::OpenConnection { token } if token == "tok-fresh")));

        let opened = step(&refreshed.new_state, Event::ConnectionOpened);
        assert_eq!(opened.new_state.reconnect_attempts, 0);
    }

    #[test]
    fn test_failed_token_refresh_falls_back_to_last_token() {
        let s = step(&connected(), Event::ConnectionClosed { reason: None }).new_state;
        let refreshed = step(&s, Event::TokenRefreshed { attempt: 1, token: None });
        assert!(has_effect(&refreshed, |e| matches!(e, Effect::OpenConnection { token } if token == "tok-1")));
    }

    #[test]
    fn test_reconnect_gives_up_after_max_attempts() {
        let mut s = connected();
        for attempt in 1..=3 {
            s = step(&s, Event::ConnectionClosed { reason: None }).new_state;
            assert_eq!(s.connection, ConnectionPhase::Reconnecting { attempt });
            s = step(
                &s,
                Event::TokenRefreshed {
                    attempt,
                    token: None,
                },
            )
            .new_state;
            assert_eq!(s.connection, ConnectionPhase::Connecting);
        }
        let last = step(&s, Event::ConnectionClosed { reason: Some("gone".to_string()) });
        assert_eq!(last.new_state.connection, ConnectionPhase::Disconnected);
        assert!(has_effect(&last, |e| matches!(e, Effect::EndSession)));
        assert_eq!(last.new_state.reconnect_attempts, 3);
    }

    #[test]
    fn test_initial_connect_failure_does_not_reconnect() {
        let s = step(
            &SessionState::default(),
            Event::Connect {
                token: "tok".to_string(),
            },
        )
        .new_state;
        let result = step(&s, Event::ConnectionClosed { reason: None });
        assert_eq!(result.new_state.connection, ConnectionPhase::Disconnected);
        assert!(!has_effect(&result, |e| matches!(e, Effect::EndSession)));
    }

    #[test]
    fn test_stop_cancels_pending_reconnect() {
        let s = step(&connected(), Event::ConnectionClosed { reason: None }).new_state;
        let stopped = step(&s, Event::Stop).new_state;
        assert!(stopped.stopped);

        let timer = step(&stopped, Event::ReconnectTimer { attempt: 1 });
        assert!(timer.effects.is_empty());
        assert_eq!(timer.new_state.connection, ConnectionPhase::Disconnected);
    }

    #[test]
    fn test_stop_closes_connection_and_ends_session() {
        let result = step(&connected(), Event::Stop);
        assert!(has_effect(&result, |e| matches!(e, Effect::CloseConnection)));
        assert!(has_effect(&result, |e| matches!(e, Effect::EndSession)));
    }

    #[test]
    fn test_offer_then_confirmation_runs_search_once() {
        let s = step(
            &connected(),
            Event::AgentMessage {
                text: "Shall I search for \"Nova\"?".to_string(),
            },
        )
        .new_state;
        assert_eq!(
            s.search,
            SearchPhase::OfferPending {
                brand: "Nova".to_string()
            }
        );

        let yes = step(&s, Event::UserMessage { text: "Yes please".to_string() });
        assert_eq!(
            yes.effects
                .iter()
                .filter(|e| matches!(e, Effect::RunSearch { .. }))
                .count(),
            1
        );

        let again = step(&yes.new_state, Event::UserMessage { text: "yes".to_string() });
        assert!(!has_effect(&again, |e| matches!(e, Effect::RunSearch { .. })));
    }

    #[test]
    fn test_offer_then_decline_clears_offer() {
        let s = step(
            &connected(),
            Event::AgentMessage {
                text: "Shall I search for \"Nova\"?".to_string(),
            },
        )
        .new_state;
        let no = step(&s, Event::UserMessage { text: "No, not now".to_string() });
        assert_eq!(no.new_state.search, SearchPhase::Idle);
        assert!(!has_effect(&no, |e| matches!(e, Effect::RunSearch { .. })));
    }

    #[test]
    fn test_search_success_feeds_back_into_conversation() {
        let mut s = connected();
        s.search = SearchPhase::Searching {
            brand: "Nova".to_string(),
        };
        let result = step(
            &s,
            Event::SearchFinished {
                brand: "Nova".to_string(),
                outcome: SearchOutcome::Found("3 similar marks".to_string()),
            },
        );
        assert_eq!(result.new_state.search, SearchPhase::Idle);
        assert!(has_effect(&result, |e| matches!(e, Effect::SendContext { text } if text == "3 similar marks")));
    }

    #[test]
    fn test_search_failure_appends_apology() {
        let mut s = connected();
        s.search = SearchPhase::Searching {
            brand: "Nova".to_string(),
        };
        let result = step(
            &s,
            Event::SearchFinished {
                brand: "Nova".to_string(),
                outcome: SearchOutcome::Failed("timeout".to_string()),
            },
        );
        assert!(has_effect(&result, |e| matches!(
            e,
            Effect::AppendTranscript { role: Role::Assistant, text } if text == APOLOGY
        )));
        assert!(!has_effect(&result, |e| matches!(e, Effect::SendContext { .. })));
    }

    #[test]
    fn test_stale_search_result_ignored() {
        let result = step(
            &connected(),
            Event::SearchFinished {
                brand: "Nova".to_string(),
                outcome: SearchOutcome::Found("late".to_string()),
            },
        );
        assert!(result.effects.is_empty());
    }

    #[test]
    fn test_messages_are_recorded() {
        let result = step(&connected(), Event::UserMessage { text: "hello".to_string() });
        assert_eq!(
            result.effects,
            vec![Effect::RecordMessage {
                role: Role::User,
                text: "hello".to_string()
            }]
        );
    }
}
