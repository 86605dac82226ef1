//! Router construction and the serve loop

use crate::config::ServerConfig;
use crate::error::{BgRemovalError, Result};
use crate::handlers;
use crate::processor::BackgroundRemover;
use crate::services::TempFileService;
use axum::{
    extract::DefaultBodyLimit,
    http::header,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Remover built once at startup
    pub remover: Arc<dyn BackgroundRemover>,
    pub temp_files: TempFileService,
    /// Backend label reported by `/health`
    pub backend: String,
    pub started_at: DateTime<Utc>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model", &self.remover.model_name())
            .field("temp_files", &self.temp_files)
            .field("backend", &self.backend)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl AppState {
    #[must_use]
    pub fn new(remover: Arc<dyn BackgroundRemover>, config: &ServerConfig) -> Self {
        Self {
            remover,
            temp_files: TempFileService::new(config.temp_dir.clone()),
            backend: config.backend_type.to_string(),
            started_at: Utc::now(),
        }
    }
}

/// Cross-origin policy: any origin, method and header, with credentials
///
/// Wildcards cannot be combined with credentials, so the request's own
/// values are mirrored back instead.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([header::CONTENT_DISPOSITION])
}

/// Build the application router
#[must_use]
pub fn create_app(state: AppState, config: &ServerConfig) -> Router {
    let body_limit = match config.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/remove", post(handlers::remove_background))
        .route("/health", get(handlers::health))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
///
/// # Errors
/// - Address cannot be bound
/// - Server I/O failure
pub async fn serve(config: &ServerConfig, remover: Arc<dyn BackgroundRemover>) -> Result<()> {
    let state = AppState::new(remover, config);
    let app = create_app(state, config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BgRemovalError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
