//! Step enumeration and stored step records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One stage of the case workflow, in enumeration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    Consultation,
    Search,
    RiskAnalysis,
    Filing,
    Watchlist,
}

impl StepName {
    pub const ALL: [StepName; 5] = [
        StepName::Consultation,
        StepName::Search,
        StepName::RiskAnalysis,
        StepName::Filing,
        StepName::Watchlist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepName::Consultation => "consultation",
            StepName::Search => "search",
            StepName::RiskAnalysis => "risk-analysis",
            StepName::Filing => "filing",
            StepName::Watchlist => "watchlist",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StepName::Consultation => "Consultation",
            StepName::Search => "Search",
            StepName::RiskAnalysis => "Risk analysis",
            StepName::Filing => "Filing",
            StepName::Watchlist => "Watchlist",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StepName::Consultation => "AI trademark advisor for a first orientation",
            StepName::Search => "Run a trademark search",
            StepName::RiskAnalysis => "Risk analysis and recommendations",
            StepName::Filing => "File the trademark with the office",
            StepName::Watchlist => "Put the trademark on the watchlist",
        }
    }

    /// Dashboard route the step navigates to
    pub fn route(self) -> &'static str {
        match self {
            StepName::Consultation => "/dashboard/copilot",
            StepName::Search => "/dashboard/search",
            StepName::RiskAnalysis => "/dashboard/risk",
            StepName::Filing => "/dashboard/filing",
            StepName::Watchlist => "/dashboard/watchlist",
        }
    }

    /// Natural-language prompt offered to the assistant when help is requested on this step
    pub fn help_prompt(self) -> &'static str {
        match self {
            StepName::Consultation => {
                "I would like advice on protecting my trademark. Where should I start?"
            }
            StepName::Search => {
                "Please explain how the trademark search works and what I need to enter."
            }
            StepName::RiskAnalysis => "How do I read the risk analysis of my search results?",
            StepName::Filing => "What do I need to prepare to file my trademark?",
            StepName::Watchlist => "How does watching my trademark for conflicts work?",
        }
    }

    pub fn index(self) -> usize {
        match self {
            StepName::Consultation => 0,
            StepName::Search => 1,
            StepName::RiskAnalysis => 2,
            StepName::Filing => 3,
            StepName::Watchlist => 4,
        }
    }

    pub fn next(self) -> Option<StepName> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<StepName> {
        self.index().checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = StepUpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| StepUpdateError::UnknownStep(s.to_string()))
    }
}

/// Stored (and displayed) status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = StepUpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "in_progress" => Ok(StepStatus::InProgress),
            "completed" => Ok(StepStatus::Completed),
            "skipped" => Ok(StepStatus::Skipped),
            other => Err(StepUpdateError::UnknownStatus(other.to_string())),
        }
    }
}

/// Persisted state of one step of one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: StepName,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub skipped_at: Option<DateTime<Utc>>,
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl StepRecord {
    pub fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            skipped_at: None,
            skip_reason: None,
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn has_completion_marker(&self) -> bool {
        self.completed_at.is_some() || self.status == StepStatus::Completed
    }

    pub fn has_skip_marker(&self) -> bool {
        self.skipped_at.is_some() || self.status == StepStatus::Skipped
    }

    pub fn is_terminal(&self) -> bool {
        self.has_completion_marker() || self.has_skip_marker()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepUpdateError {
    #[error("Unknown step: {0}")]
    UnknownStep(String),
    #[error("Unknown step status: {0}")]
    UnknownStatus(String),
    #[error("Step {step} is already {status} and cannot be set to {requested}")]
    AlreadyTerminal {
        step: StepName,
        status: StepStatus,
        requested: StepStatus,
    },
}

/// Where a new case was started from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseSource {
    #[default]
    Consultation,
    Search,
}

/// Step records for a freshly created case
pub fn initial_records(source: CaseSource, now: DateTime<Utc>) -> Vec<StepRecord> {
    StepName::ALL
        .into_iter()
        .map(|name| {
            let mut record = StepRecord::pending(name);
            match (source, name) {
                (CaseSource::Consultation, StepName::Consultation)
                | (CaseSource::Search, StepName::Search) => {
                    record.status = StepStatus::InProgress;
                    record.started_at = Some(now);
                }
                (CaseSource::Search, StepName::Consultation) => {
                    record.status = StepStatus::Skipped;
                    record.skipped_at = Some(now);
                }
                _ => {}
            }
            record
        })
        .collect()
}

/// Apply a status change to a stored step.
///
/// Terminal steps only accept terminal statuses; re-completing refreshes
/// nothing but the status string.
pub fn apply_status(
    record: &mut StepRecord,
    status: StepStatus,
    now: DateTime<Utc>,
) -> Result<(), StepUpdateError> {
    if record.is_terminal() && !status.is_terminal() {
        return Err(StepUpdateError::AlreadyTerminal {
            step: record.name,
            status: record.status,
            requested: status,
        });
    }
    // Completion wins over a later skip
    if status == StepStatus::Skipped && record.has_completion_marker() {
        return Ok(());
    }

    match status {
        StepStatus::InProgress => {
            if record.started_at.is_none() {
                record.started_at = Some(now);
            }
        }
        StepStatus::Completed => {
            if record.completed_at.is_none() {
                record.completed_at = Some(now);
            }
        }
        StepStatus::Skipped => {
            if record.skipped_at.is_none() {
                record.skipped_at = Some(now);
            }
        }
        StepStatus::Pending => {}
    }
    record.status = status;
    Ok(())
}

/// Mark a step as skipped with an optional reason. A completed step stays
/// completed.
pub fn apply_skip(record: &mut StepRecord, reason: Option<String>, now: DateTime<Utc>) {
    if record.has_completion_marker() {
        return;
    }
    record.status = StepStatus::Skipped;
    record.skipped_at = Some(now);
    record.skip_reason = reason;
}
