//! Property-based tests for the session controller

use super::state::*;
use super::transition::*;
use super::*;
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(max_attempts: u32) -> SessionContext {
    SessionContext::new("test-session")
        .with_case(Some("case-1".to_string()), Some("Nova".to_string()))
        .with_reconnect(max_attempts, Duration::from_millis(10))
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_brand() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,8}"
}

fn arb_connection_phase() -> impl Strategy<Value = ConnectionPhase> {
    prop_oneof![
        Just(ConnectionPhase::Disconnected),
        Just(ConnectionPhase::Connecting),
        Just(ConnectionPhase::Connected),
        (1u32..5).prop_map(|attempt| ConnectionPhase::Reconnecting { attempt }),
    ]
}

fn arb_search_phase() -> impl Strategy<Value = SearchPhase> {
    prop_oneof![
        Just(SearchPhase::Idle),
        arb_brand().prop_map(|brand| SearchPhase::OfferPending { brand }),
        arb_brand().prop_map(|brand| SearchPhase::Searching { brand }),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    (
        arb_connection_phase(),
        arb_search_phase(),
        0u32..4,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(connection, search, reconnect_attempts, was_connected, stopped)| SessionState {
                connection,
                search,
                reconnect_attempts,
                was_connected,
                stopped,
                last_token: Some("tok".to_string()),
            },
        )
}

fn arb_agent_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ]{1,30}",
        arb_brand().prop_map(|b| format!("Shall I search for \"{b}\"?")),
        Just("Soll ich eine Recherche durchführen?".to_string()),
    ]
}

fn arb_user_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ]{1,30}",
        Just("yes".to_string()),
        Just("Ja, gerne".to_string()),
        Just("no thanks".to_string()),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Connect {
            token: "tok-new".to_string()
        }),
        Just(Event::ConnectionOpened),
        Just(Event::ConnectionClosed { reason: None }),
        Just(Event::Stop),
        arb_agent_text().prop_map(|text| Event::AgentMessage { text }),
        arb_user_text().prop_map(|text| Event::UserMessage { text }),
        (1u32..5).prop_map(|attempt| Event::ReconnectTimer { attempt }),
        (1u32..5, proptest::option::of("[a-z]{6}"))
            .prop_map(|(attempt, token)| Event::TokenRefreshed { attempt, token }),
        (arb_brand(), any::<bool>()).prop_map(|(brand, ok)| Event::SearchFinished {
            outcome: if ok {
                SearchOutcome::Found(format!("results for {brand}"))
            } else {
                SearchOutcome::Failed("timeout".to_string())
            },
            brand,
        }),
    ]
}

fn count_run_search(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::RunSearch { .. }))
        .count()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Reconnect attempts never exceed the configured maximum
    #[test]
    fn prop_reconnect_attempts_bounded(
        max_attempts in 0u32..5,
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let ctx = test_context(max_attempts);
        let mut state = SessionState::default();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
                prop_assert!(state.reconnect_attempts <= max_attempts);
                if let ConnectionPhase::Reconnecting { attempt } = state.connection {
                    prop_assert!(attempt >= 1 && attempt <= max_attempts);
                }
                for effect in &result.effects {
                    if let Effect::ScheduleReconnect { attempt, .. } = effect {
                        prop_assert!(*attempt <= max_attempts);
                    }
                }
            }
        }
    }

    // A running search is never started twice
    #[test]
    fn prop_busy_search_never_restarts(
        brand in arb_brand(),
        events in proptest::collection::vec(arb_event(), 0..10)
    ) {
        let ctx = test_context(3);
        let mut state = SessionState {
            connection: ConnectionPhase::Connected,
            search: SearchPhase::Searching { brand },
            was_connected: true,
            ..SessionState::default()
        };

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                if state.search.is_busy() {
                    prop_assert_eq!(count_run_search(&result.effects), 0);
                }
                state = result.new_state;
            }
        }
    }

    // A RunSearch effect always comes with the Searching phase
    #[test]
    fn prop_run_search_implies_searching(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, &test_context(3), event) {
            let runs = count_run_search(&result.effects);
            prop_assert!(runs <= 1);
            if runs == 1 {
                prop_assert!(result.new_state.search.is_busy());
            }
        }
    }

    // Declining an offer clears it without searching
    #[test]
    fn prop_non_affirmative_reply_clears_offer(
        brand in arb_brand(),
        reply in prop_oneof![
            Just("no".to_string()),
            Just("nein, danke".to_string()),
            Just("maybe later".to_string()),
            "[0-9]{1,5}",
        ]
    ) {
        let state = SessionState {
            connection: ConnectionPhase::Connected,
            search: SearchPhase::OfferPending { brand },
            was_connected: true,
            ..SessionState::default()
        };
        let result = transition(&state, &test_context(3), Event::UserMessage { text: reply }).unwrap();
        prop_assert_eq!(result.new_state.search, SearchPhase::Idle);
        prop_assert_eq!(count_run_search(&result.effects), 0);
    }

    // After stop, nothing reopens the connection until the next connect
    #[test]
    fn prop_stop_suppresses_reconnect(
        state in arb_state(),
        events in proptest::collection::vec(arb_event(), 0..20)
    ) {
        let ctx = test_context(3);
        let mut state = transition(&state, &ctx, Event::Stop).unwrap().new_state;

        for event in events {
            let is_connect = matches!(event, Event::Connect { .. });
            if is_connect {
                break;
            }
            if let Ok(result) = transition(&state, &ctx, event) {
                prop_assert!(
                    !result.effects.iter().any(|e| matches!(
                        e,
                        Effect::OpenConnection { .. } | Effect::ScheduleReconnect { .. }
                    )),
                    "Stopped session reopened: {:?}",
                    result.effects
                );
                state = result.new_state;
            }
        }
    }

    // Every state accepts a stop
    #[test]
    fn prop_stop_always_succeeds(state in arb_state()) {
        let result = transition(&state, &test_context(3), Event::Stop);
        prop_assert!(result.is_ok());
        let new_state = result.unwrap().new_state;
        prop_assert_eq!(new_state.connection, ConnectionPhase::Disconnected);
        prop_assert_eq!(new_state.search, SearchPhase::Idle);
    }
}
