//! HTTP API and server-rendered pages

mod assets;
mod handlers;
mod pages;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::agents::Orchestrator;
use crate::db::Database;
use crate::llm::LlmService;
use crate::runtime::{
    ConsultationRecorder, SessionManager, SessionSettings, TokenSource, TrademarkSearch,
};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: Arc<SessionManager>,
    pub search: Arc<dyn TrademarkSearch>,
    pub tokens: Arc<dyn TokenSource>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(
        db: Database,
        tokens: Arc<dyn TokenSource>,
        search: Arc<dyn TrademarkSearch>,
        llm: Option<Arc<dyn LlmService>>,
        settings: SessionSettings,
    ) -> Self {
        let recorder = Arc::new(ConsultationRecorder::new(db.clone(), llm));
        let sessions = SessionManager::new(tokens.clone(), search.clone(), recorder, settings);
        Self {
            db,
            sessions: Arc::new(sessions),
            search,
            tokens,
            orchestrator: Arc::new(Orchestrator::default()),
        }
    }
}
