//! Derived display state for a case's workflow

use super::step::{StepName, StepRecord, StepStatus};
use serde::Serialize;

/// Display state of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub name: StepName,
    pub label: &'static str,
    pub description: &'static str,
    pub route: &'static str,
    pub status: StepStatus,
}

impl StepView {
    /// Only finished steps and the current step navigate on click
    pub fn is_clickable(&self) -> bool {
        self.status != StepStatus::Pending
    }
}

/// Display state of the whole workflow, in enumeration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    pub steps: Vec<StepView>,
}

impl WorkflowView {
    /// The step currently being worked on, `None` once every step is terminal
    pub fn current(&self) -> Option<StepName> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
            .map(|s| s.name)
    }

    pub fn status_of(&self, name: StepName) -> StepStatus {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .map_or(StepStatus::Pending, |s| s.status)
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }

    pub fn progress_percent(&self) -> u8 {
        let done = self.steps.iter().filter(|s| s.status.is_terminal()).count();
        let total = self.steps.len().max(1);
        u8::try_from(done * 100 / total).unwrap_or(100)
    }
}

/// Compute the display status of every step from stored records.
///
/// Completion markers win over skip markers. The first step without either
/// marker is `in_progress`; everything after it is `pending`, whatever its
/// stored status string says.
pub fn derive_view(records: &[StepRecord]) -> WorkflowView {
    let mut current_assigned = false;

    let steps = StepName::ALL
        .into_iter()
        .map(|name| {
            let record = records.iter().find(|r| r.name == name);
            let status = match record {
                Some(r) if r.has_completion_marker() => StepStatus::Completed,
                Some(r) if r.has_skip_marker() => StepStatus::Skipped,
                _ if !current_assigned => {
                    current_assigned = true;
                    StepStatus::InProgress
                }
                _ => StepStatus::Pending,
            };
            StepView {
                name,
                label: name.label(),
                description: name.description(),
                route: name.route(),
                status,
            }
        })
        .collect();

    WorkflowView { steps }
}

/// Navigation target for a step click
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepLink {
    pub step: StepName,
    pub href: String,
    pub prompt: Option<String>,
}

/// Build the link a step click navigates to, optionally seeding the help prompt
pub fn step_link(step: StepName, case_id: &str, seed_prompt: bool) -> StepLink {
    let prompt = seed_prompt.then(|| step.help_prompt().to_string());

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("case", case_id);
    if let Some(p) = &prompt {
        query.append_pair("prompt", p);
    }
    let href = format!("{}?{}", step.route(), query.finish());

    StepLink { step, href, prompt }
}
