//! Proposal "agents"
//!
//! Four specialists look at a change request from their angle, review each
//! other by fixed rules, and the orchestrator merges everything into one
//! proposal the user can accept, reject or ask to change. All output is
//! template text; no model is involved.

mod orchestrator;
mod proposal;
mod specialists;

pub use orchestrator::Orchestrator;
pub use proposal::{render_proposal, respond, Decision, ProposalReply};
pub use specialists::{
    CodeSpecialist, DesignSpecialist, QaSpecialist, Specialist, WorkflowSpecialist,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Code,
    Design,
    Workflow,
    Qa,
}

impl AgentKind {
    pub fn agent_name(self) -> &'static str {
        match self {
            AgentKind::Code => "code-agent",
            AgentKind::Design => "design-agent",
            AgentKind::Workflow => "workflow-agent",
            AgentKind::Qa => "qa-agent",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

/// A change request as handed to every specialist
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    pub id: String,
    pub prompt: String,
    pub received_at: DateTime<Utc>,
}

/// One specialist's analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub kind: AgentKind,
    pub analysis: String,
    pub suggestions: Vec<String>,
    pub concerns: Vec<String>,
    pub files: Vec<String>,
    pub estimated_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReviewComment {
    pub from: AgentKind,
    pub to: AgentKind,
    pub comment: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Modify,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub change_type: ChangeType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseChange {
    pub table: String,
    pub operation: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestChange {
    pub file: String,
    pub kind: String,
    pub description: String,
}

/// Merged proposal awaiting the user's decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalProposal {
    pub id: String,
    pub request: String,
    pub summary: String,
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub database: Vec<DatabaseChange>,
    #[serde(default)]
    pub tests: Vec<TestChange>,
    #[serde(default)]
    pub reviews: Vec<CrossReviewComment>,
    pub risks: Vec<String>,
    pub benefits: Vec<String>,
    pub estimated_minutes: u32,
    pub requires_confirmation: bool,
}
