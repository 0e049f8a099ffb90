//! HTTP server for table extraction.
//!
//! ## Startup order
//!
//! [`run`] checks everything that can fail fatally *before* binding the
//! port: API key present, provider constructible, uploads directory
//! creatable. A misconfigured server therefore never accepts a connection.

pub mod state;
pub mod storage;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::extract::TableExtractor;
use crate::pipeline::llm::ProviderVision;
use state::AppState;

pub use state::FORM_FIELDS_ALLOWANCE;

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.max_body_bytes();

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/upload",
            post(upload::upload_table).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Validate the environment, then serve until the process is stopped.
///
/// # Errors
/// [`StartupError::MissingCredential`] if the API key variable is unset or
/// empty; the port is not bound in that case.
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    config.require_api_key()?;
    let vision = ProviderVision::from_config(&config)?;
    let extractor = TableExtractor::new(Arc::new(vision));
    serve(config, extractor).await
}

/// Serve with an already-built extractor (the credential check is the caller's job).
pub async fn serve(config: ServerConfig, extractor: TableExtractor) -> Result<(), StartupError> {
    storage::ensure_uploads_dir(&config.uploads_dir).await?;

    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("Server started on http://{}", addr);
    info!("Vision model: {}", extractor.model());
    info!("Uploads are saved to: {}", config.uploads_dir.display());

    let app = router(AppState::new(config, extractor));
    axum::serve(listener, app)
        .await
        .map_err(StartupError::Serve)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
