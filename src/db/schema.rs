//! Database schema and record types

pub use crate::consultation::{Consultation, ConsultationMode, ConsultationStatus};
use crate::workflow::{StepName, StepRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS cases (
    id TEXT PRIMARY KEY,
    case_number TEXT NOT NULL UNIQUE,
    trademark_name TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cases_created ON cases(created_at DESC);

CREATE TABLE IF NOT EXISTS case_steps (
    case_id TEXT NOT NULL,
    step TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    started_at TEXT,
    completed_at TEXT,
    skipped_at TEXT,
    skip_reason TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',

    PRIMARY KEY (case_id, step),
    FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS case_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    step TEXT,
    payload TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,

    FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_case_events_case ON case_events(case_id, id);

CREATE TABLE IF NOT EXISTS consultations (
    id TEXT PRIMARY KEY,
    case_id TEXT,
    title TEXT NOT NULL,
    transcript TEXT NOT NULL DEFAULT '',
    duration_secs INTEGER NOT NULL DEFAULT 0,
    summary TEXT,
    mode TEXT NOT NULL DEFAULT 'voice',
    status TEXT NOT NULL DEFAULT 'draft',
    trademark_name TEXT,
    countries TEXT NOT NULL DEFAULT '[]',
    nice_classes TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_consultations_created ON consultations(created_at DESC);
";

/// Lifecycle of a case as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Draft => "draft",
            CaseStatus::Active => "active",
            CaseStatus::Completed => "completed",
            CaseStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            other => Err(format!("Unknown case status: {other}")),
        }
    }
}

/// Case record with its stored steps
#[derive(Debug, Clone, Serialize)]
pub struct Case {
    pub id: String,
    pub case_number: String,
    pub trademark_name: Option<String>,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
}

/// Audit entries written alongside step changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseEventType {
    CaseCreated,
    StepStarted,
    StepStatusChanged,
    StepSkipped,
}

impl CaseEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseEventType::CaseCreated => "case_created",
            CaseEventType::StepStarted => "step_started",
            CaseEventType::StepStatusChanged => "step_status_changed",
            CaseEventType::StepSkipped => "step_skipped",
        }
    }

    pub(crate) fn parse(s: &str) -> Self {
        match s {
            "step_started" => CaseEventType::StepStarted,
            "step_skipped" => CaseEventType::StepSkipped,
            "case_created" => CaseEventType::CaseCreated,
            _ => CaseEventType::StepStatusChanged,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseEvent {
    pub id: i64,
    pub case_id: String,
    pub event_type: CaseEventType,
    pub step: Option<StepName>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}
