//! Case workflow tracking
//!
//! A case moves through a fixed, ordered list of steps. Only per-step markers
//! are stored; which step is "current" is always derived.

mod step;
mod tracker;

#[cfg(test)]
mod proptests;

pub use step::{
    apply_skip, apply_status, initial_records, CaseSource, StepName, StepRecord, StepStatus,
    StepUpdateError,
};
pub use tracker::{derive_view, step_link, StepLink, StepView, WorkflowView};
