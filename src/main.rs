//! Trademark Desk - guided trademark registration
//!
//! An axum server tracking trademark cases through their workflow steps and
//! driving voice consultations with the trademark copilot.

mod agents;
mod api;
mod config;
mod consultation;
mod db;
mod llm;
mod runtime;
mod search;
mod session;
mod token;
mod workflow;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::LlmService;
use runtime::{TmSearchService, TokenSource, TrademarkSearch};
use search::{SearchRateLimiter, TmSearchClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use token::SpeechTokenClient;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trademark_desk=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    // External services
    let search_client = TmSearchClient::new(
        config.tmsearch_api_key.clone(),
        config.tmsearch_base_url.clone(),
    );
    if search_client.is_test_mode() {
        tracing::warn!("TMSEARCH_API_KEY not set, trademark search runs in test mode");
    }
    let search: Arc<dyn TrademarkSearch> = Arc::new(TmSearchService::new(
        search_client,
        Arc::new(SearchRateLimiter::default()),
    ));

    let token_client =
        SpeechTokenClient::new(config.hume_api_key.clone(), config.hume_secret_key.clone());
    if !token_client.is_configured() {
        tracing::warn!("No speech vendor credentials. Set HUME_API_KEY and HUME_SECRET_KEY.");
    }
    let tokens: Arc<dyn TokenSource> = Arc::new(token_client);

    let llm = llm::from_config(
        config.openai_api_key.as_deref(),
        &config.openai_model,
        config.openai_base_url.as_deref(),
    );
    match &llm {
        Some(service) => tracing::info!(model = %service.model_id(), "Summary model configured"),
        None => tracing::warn!("OPENAI_API_KEY not set, consultations get template summaries"),
    }

    let state = AppState::new(db, tokens, search, llm, config.session_settings());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Trademark Desk listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
