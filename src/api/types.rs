//! API request and response types

use crate::agents::{FinalProposal, ProposalReply};
use crate::db::{Case, CaseEvent};
use crate::search::SearchSummary;
use crate::workflow::{CaseSource, StepRecord, WorkflowView};
use serde::{Deserialize, Serialize};

/// Request to create a case
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateCaseRequest {
    pub trademark_name: Option<String>,
    pub source: CaseSource,
}

/// Case with its derived workflow view
#[derive(Debug, Serialize)]
pub struct CaseResponse {
    pub case: Case,
    pub workflow: WorkflowView,
    pub current_step: Option<crate::workflow::StepName>,
    pub progress_percent: u8,
}

impl CaseResponse {
    pub fn new(case: Case) -> Self {
        let workflow = crate::workflow::derive_view(&case.steps);
        Self {
            current_step: workflow.current(),
            progress_percent: workflow.progress_percent(),
            workflow,
            case,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CaseListResponse {
    pub cases: Vec<CaseResponse>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub case_id: String,
    pub workflow: WorkflowView,
    pub events: Vec<CaseEvent>,
}

/// Step status change; names arrive as wire strings and are validated
#[derive(Debug, Deserialize)]
pub struct UpdateStepRequest {
    pub step: String,
    pub status: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SkipStepRequest {
    pub step: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub step: StepRecord,
    pub workflow: WorkflowView,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConsultationListQuery {
    pub case_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsultationListResponse {
    pub consultations: Vec<crate::db::Consultation>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Search requested by the assistant during a conversation
#[derive(Debug, Deserialize)]
pub struct AssistantSearchRequest {
    pub search_term: String,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub classes: Vec<u8>,
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssistantSearchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: SearchSummary,
}

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ProposalResponse {
    pub proposal: FinalProposal,
    pub rendered: String,
}

#[derive(Debug, Deserialize)]
pub struct ProposalAnswerRequest {
    pub answer: String,
    pub proposal: FinalProposal,
}

#[derive(Debug, Serialize)]
pub struct ProposalAnswerResponse {
    #[serde(flatten)]
    pub reply: ProposalReply,
}

/// Start (or rejoin) a conversation session
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionRequest {
    /// Existing consultation to record into; a new one is created otherwise
    pub consultation_id: Option<String>,
    pub case_id: Option<String>,
    pub trademark_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub consultation_id: String,
    pub case_id: Option<String>,
    pub stream_url: String,
    pub events_url: String,
}

/// Response for queued session events
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
