//! Consultation records
//!
//! A consultation is one advisory conversation, voice or text. The live
//! session appends paired transcript lines while it runs; when it ends the
//! record is summarized and the facts the advisor tagged are extracted.

mod extract;
mod summary;

pub use extract::{extract_triggers, strip_triggers, Triggers};
pub use summary::{
    fallback_summary, fallback_title, generate_summary, generate_title, is_generated_title,
};

use crate::session::transcript::TranscriptMessage;
use crate::session::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub(crate) const USER_PREFIX: &str = "User: ";
const ASSISTANT_PREFIX: &str = "Assistant: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    #[default]
    Draft,
    Completed,
}

impl ConsultationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsultationStatus::Draft => "draft",
            ConsultationStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationMode {
    #[default]
    Voice,
    Text,
}

impl ConsultationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsultationMode::Voice => "voice",
            ConsultationMode::Text => "text",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "completed" => Ok(Self::Completed),
            other => Err(format!("Unknown consultation status: {other}")),
        }
    }
}

impl FromStr for ConsultationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voice" => Ok(Self::Voice),
            "text" => Ok(Self::Text),
            other => Err(format!("Unknown consultation mode: {other}")),
        }
    }
}

/// Stored consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    pub case_id: Option<String>,
    pub title: String,
    pub transcript: String,
    pub duration_secs: u64,
    pub summary: Option<String>,
    pub mode: ConsultationMode,
    pub status: ConsultationStatus,
    pub trademark_name: Option<String>,
    pub countries: Vec<String>,
    pub nice_classes: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new consultation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewConsultation {
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mode: ConsultationMode,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsultationUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub transcript: Option<String>,
    pub duration_secs: Option<u64>,
    pub status: Option<ConsultationStatus>,
    pub case_id: Option<String>,
    pub trademark_name: Option<String>,
    pub countries: Option<Vec<String>>,
    pub nice_classes: Option<Vec<u8>>,
}

impl ConsultationUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.transcript.is_none()
            && self.duration_secs.is_none()
            && self.status.is_none()
            && self.case_id.is_none()
            && self.trademark_name.is_none()
            && self.countries.is_none()
            && self.nice_classes.is_none()
    }
}

/// Render transcript lines as stored text, one line per message
pub fn format_transcript(lines: &[TranscriptMessage]) -> String {
    lines.iter().fold(String::new(), |mut out, line| {
        let prefix = match line.role {
            Role::User => USER_PREFIX,
            Role::Assistant => ASSISTANT_PREFIX,
        };
        out.push_str(prefix);
        out.push_str(line.text.trim());
        out.push('\n');
        out
    })
}
