//! Property-based tests for workflow derivation

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

fn arb_step_name() -> impl Strategy<Value = StepName> {
    prop_oneof![
        Just(StepName::Consultation),
        Just(StepName::Search),
        Just(StepName::RiskAnalysis),
        Just(StepName::Filing),
        Just(StepName::Watchlist),
    ]
}

fn arb_status() -> impl Strategy<Value = StepStatus> {
    prop_oneof![
        Just(StepStatus::Pending),
        Just(StepStatus::InProgress),
        Just(StepStatus::Completed),
        Just(StepStatus::Skipped),
    ]
}

fn arb_timestamp() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop::option::of((0i64..2_000_000_000).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }))
}

/// Arbitrary stored record, including inconsistent status/timestamp combinations
fn arb_record() -> impl Strategy<Value = StepRecord> {
    (
        arb_step_name(),
        arb_status(),
        arb_timestamp(),
        arb_timestamp(),
        arb_timestamp(),
    )
        .prop_map(|(name, status, started_at, completed_at, skipped_at)| StepRecord {
            name,
            status,
            started_at,
            completed_at,
            skipped_at,
            skip_reason: None,
            metadata: serde_json::Value::Null,
        })
}

fn arb_records() -> impl Strategy<Value = Vec<StepRecord>> {
    proptest::collection::vec(arb_record(), 0..8)
}

proptest! {
    #[test]
    fn exactly_one_in_progress_unless_all_terminal(records in arb_records()) {
        let view = derive_view(&records);
        let in_progress = view
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::InProgress)
            .count();

        if view.is_complete() {
            prop_assert_eq!(in_progress, 0);
        } else {
            prop_assert_eq!(in_progress, 1);
        }
    }

    #[test]
    fn terminal_markers_never_display_as_pending(records in arb_records()) {
        let view = derive_view(&records);
        for step in &view.steps {
            let first = records.iter().find(|r| r.name == step.name);
            if let Some(record) = first {
                if record.is_terminal() {
                    prop_assert!(step.status.is_terminal());
                }
            }
        }
    }

    #[test]
    fn current_is_first_non_terminal(records in arb_records()) {
        let view = derive_view(&records);
        let expected = view
            .steps
            .iter()
            .find(|s| !s.status.is_terminal())
            .map(|s| s.name);
        prop_assert_eq!(view.current(), expected);
        // Nothing before the current step is pending
        if let Some(current) = view.current() {
            for step in view.steps.iter().take(current.index()) {
                prop_assert!(step.status.is_terminal());
            }
        }
    }

    #[test]
    fn completed_step_stays_terminal_under_updates(
        updates in proptest::collection::vec(arb_status(), 1..10)
    ) {
        let now = Utc::now();
        let mut record = StepRecord::pending(StepName::Search);
        apply_status(&mut record, StepStatus::Completed, now).unwrap();

        for status in updates {
            let _ = apply_status(&mut record, status, now);
            prop_assert!(record.is_terminal());
            // Stored and derived status agree
            prop_assert_eq!(record.status, StepStatus::Completed);
            let view = derive_view(std::slice::from_ref(&record));
            prop_assert_eq!(view.status_of(StepName::Search), StepStatus::Completed);
        }
    }
}
