//! HTTP request handlers

use super::assets::serve_static;
use super::pages;
use super::sse::sse_stream;
use super::types::{
    AssistantSearchRequest, AssistantSearchResponse, CaseListResponse, CaseResponse,
    ConsultationListQuery, ConsultationListResponse, CreateCaseRequest, CreateSessionRequest,
    ErrorResponse, EventResponse, ProposalAnswerRequest, ProposalAnswerResponse, ProposalRequest,
    ProposalResponse, SessionResponse, SkipStepRequest, StepResponse, SuccessResponse,
    TokenResponse, UpdateStepRequest, WorkflowResponse,
};
use super::AppState;
use crate::agents::{render_proposal, respond};
use crate::consultation::{Consultation, ConsultationMode, ConsultationUpdate, NewConsultation};
use crate::db::DbError;
use crate::search::{SearchErrorKind, SearchQuery, SearchSummary};
use crate::session::Event;
use crate::token::TokenError;
use crate::workflow::{derive_view, step_link, StepName, StepStatus};
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Pages
        .route("/", get(landing_page))
        .route("/dashboard", get(dashboard_page))
        .route("/dashboard/cases/:id", get(case_page))
        .route("/dashboard/cases/:id/steps/:step", get(navigate_step))
        .route("/assets/*path", get(serve_static))
        // Cases and workflow
        .route("/api/cases", get(list_cases).post(create_case))
        .route("/api/cases/:id", get(get_case))
        .route("/api/cases/:id/workflow", get(get_workflow))
        .route("/api/cases/:id/steps", patch(update_step))
        .route("/api/cases/:id/skip", post(skip_step))
        // Consultations
        .route(
            "/api/consultations",
            get(list_consultations).post(create_consultation),
        )
        .route(
            "/api/consultations/:id",
            get(get_consultation)
                .patch(update_consultation)
                .delete(delete_consultation),
        )
        // Speech vendor and assistant tools
        .route("/api/token", get(get_token))
        .route("/api/assistant-tools/search", post(assistant_search))
        // Proposal agents
        .route("/api/agents/proposals", post(create_proposal))
        .route("/api/agents/proposals/respond", post(answer_proposal))
        // Conversation sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", delete(close_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/api/sessions/:id/events", post(send_session_event))
        // Version
        .route("/version", get(get_version));

    // Step workspaces live at fixed dashboard routes
    for step in StepName::ALL {
        router = router.route(step.route(), get(step_page));
    }

    router.with_state(state)
}

// ============================================================
// Pages
// ============================================================

async fn landing_page() -> Html<String> {
    Html(pages::landing())
}

async fn dashboard_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let cases = state.db.list_cases()?;
    Ok(Html(pages::dashboard(&cases)))
}

async fn case_page(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let case = match state.db.get_case(&id) {
        Ok(case) => case,
        Err(e) => return page_error(&e),
    };
    match state.db.list_consultations(Some(&case.id)) {
        Ok(consultations) => Html(pages::case_page(&case, &consultations)).into_response(),
        Err(e) => page_error(&e),
    }
}

#[derive(Debug, Deserialize)]
struct NavigateQuery {
    prompt: Option<String>,
}

/// Follow a stepper click: reachable steps redirect to their workspace,
/// pending ones back to the case
async fn navigate_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(String, String)>,
    Query(query): Query<NavigateQuery>,
) -> Response {
    let case = match state.db.get_case(&id) {
        Ok(case) => case,
        Err(e) => return page_error(&e),
    };
    let Ok(step) = step.parse::<StepName>() else {
        return (
            StatusCode::NOT_FOUND,
            Html(pages::not_found(&format!("Unknown step: {step}"))),
        )
            .into_response();
    };

    let view = derive_view(&case.steps);
    let clickable = view
        .steps
        .iter()
        .any(|s| s.name == step && s.is_clickable());
    if !clickable {
        return Redirect::to(&format!("/dashboard/cases/{}", case.id)).into_response();
    }

    let seed = query.prompt.is_some_and(|p| p != "0" && p != "false");
    Redirect::to(&step_link(step, &case.id, seed).href).into_response()
}

#[derive(Debug, Deserialize)]
struct StepPageQuery {
    case: Option<String>,
    prompt: Option<String>,
}

async fn step_page(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<StepPageQuery>,
) -> Response {
    let Some(step) = StepName::ALL.into_iter().find(|s| s.route() == uri.path()) else {
        return (StatusCode::NOT_FOUND, Html(pages::not_found("Unknown page"))).into_response();
    };

    let case = match query.case.as_deref().filter(|c| !c.is_empty()) {
        Some(key) => match state.db.get_case(key) {
            Ok(case) => Some(case),
            Err(e) => return page_error(&e),
        },
        None => None,
    };

    Html(pages::step_page(step, case.as_ref(), query.prompt.as_deref())).into_response()
}

fn page_error(e: &DbError) -> Response {
    match e {
        DbError::CaseNotFound(_) | DbError::ConsultationNotFound(_) => {
            (StatusCode::NOT_FOUND, Html(pages::not_found(&e.to_string()))).into_response()
        }
        _ => {
            tracing::error!(error = %e, "Page rendering failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::not_found("Something went wrong")),
            )
                .into_response()
        }
    }
}

// ============================================================
// Cases and Workflow
// ============================================================

async fn list_cases(State(state): State<AppState>) -> Result<Json<CaseListResponse>, AppError> {
    let cases = state.db.list_cases()?;
    Ok(Json(CaseListResponse {
        cases: cases.into_iter().map(CaseResponse::new).collect(),
    }))
}

async fn create_case(
    State(state): State<AppState>,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<CaseResponse>), AppError> {
    let case = state
        .db
        .create_case(req.trademark_name.as_deref(), req.source)?;
    tracing::info!(case_id = %case.id, case_number = %case.case_number, "Case created");
    Ok((StatusCode::CREATED, Json(CaseResponse::new(case))))
}

async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CaseResponse>, AppError> {
    Ok(Json(CaseResponse::new(state.db.get_case(&id)?)))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let case = state.db.get_case(&id)?;
    let events = state.db.list_case_events(&case.id)?;
    Ok(Json(WorkflowResponse {
        workflow: derive_view(&case.steps),
        case_id: case.id,
        events,
    }))
}

async fn update_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStepRequest>,
) -> Result<Json<StepResponse>, AppError> {
    let step: StepName = req
        .step
        .parse()
        .map_err(|e: crate::workflow::StepUpdateError| AppError::BadRequest(e.to_string()))?;
    let status: StepStatus = req
        .status
        .parse()
        .map_err(|e: crate::workflow::StepUpdateError| AppError::BadRequest(e.to_string()))?;

    let record = state.db.update_step(&id, step, status, req.metadata)?;
    let case = state.db.get_case(&id)?;
    Ok(Json(StepResponse {
        step: record,
        workflow: derive_view(&case.steps),
    }))
}

async fn skip_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SkipStepRequest>,
) -> Result<Json<StepResponse>, AppError> {
    let step: StepName = req
        .step
        .parse()
        .map_err(|e: crate::workflow::StepUpdateError| AppError::BadRequest(e.to_string()))?;
    let reason = req.reason.filter(|r| !r.trim().is_empty());

    let record = state.db.skip_step(&id, step, reason)?;
    let case = state.db.get_case(&id)?;
    Ok(Json(StepResponse {
        step: record,
        workflow: derive_view(&case.steps),
    }))
}

// ============================================================
// Consultations
// ============================================================

async fn list_consultations(
    State(state): State<AppState>,
    Query(query): Query<ConsultationListQuery>,
) -> Result<Json<ConsultationListResponse>, AppError> {
    let consultations = state.db.list_consultations(query.case_id.as_deref())?;
    Ok(Json(ConsultationListResponse { consultations }))
}

async fn create_consultation(
    State(state): State<AppState>,
    Json(req): Json<NewConsultation>,
) -> Result<(StatusCode, Json<Consultation>), AppError> {
    let consultation = state.db.create_consultation(&req)?;
    Ok((StatusCode::CREATED, Json(consultation)))
}

async fn get_consultation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Consultation>, AppError> {
    Ok(Json(state.db.get_consultation(&id)?))
}

async fn update_consultation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConsultationUpdate>,
) -> Result<Json<Consultation>, AppError> {
    if req.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    let consultation = state.db.update_consultation(&id, &req)?;
    if req.status == Some(crate::consultation::ConsultationStatus::Completed) {
        state.db.record_consultation_completed(&consultation)?;
    }
    Ok(Json(consultation))
}

async fn delete_consultation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_consultation(&id)?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Speech Token and Assistant Tools
// ============================================================

async fn get_token(State(state): State<AppState>) -> Result<Json<TokenResponse>, AppError> {
    match state.tokens.fetch_token().await {
        Ok(access_token) => Ok(Json(TokenResponse { access_token })),
        Err(TokenError::MissingCredentials) => {
            tracing::error!("Speech vendor credentials missing");
            Err(AppError::Internal("API keys not configured".to_string()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch speech token");
            Err(AppError::BadGateway(
                "Failed to fetch access token".to_string(),
            ))
        }
    }
}

async fn assistant_search(
    State(state): State<AppState>,
    Json(req): Json<AssistantSearchRequest>,
) -> Result<Json<AssistantSearchResponse>, AppError> {
    if req.search_term.trim().is_empty() {
        return Err(AppError::BadRequest(
            "search_term is required".to_string(),
        ));
    }

    let requester = req
        .session_id
        .as_deref()
        .or(req.case_id.as_deref())
        .unwrap_or("anonymous")
        .to_string();
    let query = SearchQuery::new(req.search_term)
        .with_countries(req.countries)
        .with_classes(req.classes);

    let started = std::time::Instant::now();
    let result = state.search.search(&requester, &query).await;
    match result {
        Ok(summary) => {
            tracing::info!(
                term = %query.term,
                requester = %requester,
                results = summary.total_results,
                risk = summary.risk_level.as_str(),
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Assistant search completed"
            );
            if let Some(case_id) = req.case_id.as_deref() {
                record_search(&state, case_id, &query, &summary);
            }
            Ok(Json(AssistantSearchResponse {
                success: true,
                result: summary,
            }))
        }
        Err(e) => {
            tracing::warn!(term = %query.term, error = %e, "Assistant search failed");
            Err(match e.kind {
                SearchErrorKind::InvalidQuery => AppError::BadRequest(e.message),
                SearchErrorKind::RateLimited => AppError::TooManyRequests(e.message),
                SearchErrorKind::Network | SearchErrorKind::Upstream => AppError::BadGateway(
                    "An error occurred during the search.".to_string(),
                ),
            })
        }
    }
}

/// Keep the latest search on the case's search step
fn record_search(state: &AppState, case_id: &str, query: &SearchQuery, summary: &SearchSummary) {
    let metadata = json!({
        "query": query,
        "total_results": summary.total_results,
        "risk_level": summary.risk_level,
        "top_conflicts": summary.top_conflicts,
    });
    if let Err(e) = state
        .db
        .merge_step_metadata(case_id, StepName::Search, metadata)
    {
        tracing::warn!(case_id = %case_id, error = %e, "Failed to record search on case");
    }
}

// ============================================================
// Proposal Agents
// ============================================================

async fn create_proposal(
    State(state): State<AppState>,
    Json(req): Json<ProposalRequest>,
) -> Result<Json<ProposalResponse>, AppError> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::BadRequest("prompt is required".to_string()));
    }
    let proposal = state.orchestrator.process_request(prompt).await;
    Ok(Json(ProposalResponse {
        rendered: render_proposal(&proposal),
        proposal,
    }))
}

async fn answer_proposal(Json(req): Json<ProposalAnswerRequest>) -> Json<ProposalAnswerResponse> {
    Json(ProposalAnswerResponse {
        reply: respond(&req.answer, &req.proposal),
    })
}

// ============================================================
// Conversation Sessions
// ============================================================

/// Start a session recording into a consultation, creating one if needed
async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let consultation = match req.consultation_id.as_deref() {
        Some(id) => state.db.get_consultation(id)?,
        None => state.db.create_consultation(&NewConsultation {
            case_id: req.case_id.clone(),
            mode: ConsultationMode::Voice,
            ..NewConsultation::default()
        })?,
    };

    let case = match consultation.case_id.as_deref().or(req.case_id.as_deref()) {
        Some(key) => Some(state.db.get_case(key)?),
        None => None,
    };
    let trademark_name = req
        .trademark_name
        .or_else(|| case.as_ref().and_then(|c| c.trademark_name.clone()));
    let case_id = case.map(|c| c.id);

    let handle = state
        .sessions
        .start(&consultation.id, case_id.clone(), trademark_name)
        .await;
    let session_id = handle.context.session_id.clone();
    tracing::info!(session_id = %session_id, case_id = ?case_id, "Session started");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            stream_url: format!("/api/sessions/{session_id}/stream"),
            events_url: format!("/api/sessions/{session_id}/events"),
            consultation_id: consultation.id,
            session_id,
            case_id,
        }),
    ))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (init, rx) = state
        .sessions
        .subscribe(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))?;
    Ok(sse_stream(init, rx))
}

async fn send_session_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(event): Json<Event>,
) -> Result<Json<EventResponse>, AppError> {
    if !event.is_client_event() {
        return Err(AppError::BadRequest("Unsupported event".to_string()));
    }
    state
        .sessions
        .send_event(&id, event)
        .await
        .map_err(AppError::NotFound)?;
    Ok(Json(EventResponse { queued: true }))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.close(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("trademark-desk ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    BadGateway(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::CaseNotFound(_) | DbError::ConsultationNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            DbError::StepUpdate(_) => AppError::Conflict(e.to_string()),
            DbError::Sqlite(_) | DbError::Json(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
