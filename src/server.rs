//! HTTP server setup and configuration.
//!
//! This module provides the router and application state used by both
//! the production server and integration tests.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::error::ApiError;
use crate::models::{AppConfig, RenderRequest};
use crate::rendering::{ChromeLauncher, Launcher};
use crate::services::{AssetCache, FontIndex, PipelineOptions, RenderPipeline, RendererPool};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RenderPipeline>,
}

/// Create application state backed by headless Chrome.
pub fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let launcher = Arc::new(ChromeLauncher::new(
        config.chrome_path.clone(),
        config.launch_timeout(),
        config.load_timeout(),
    ));
    create_app_state_with_launcher(config, launcher)
}

/// Create application state with a custom renderer launcher.
///
/// The renderer is not started here; the first render request does that.
pub fn create_app_state_with_launcher(
    config: &AppConfig,
    launcher: Arc<dyn Launcher>,
) -> anyhow::Result<AppState> {
    let fonts = Arc::new(FontIndex::scan(&config.fonts_dir));
    let assets = Arc::new(AssetCache::new(
        config.cache_dir.clone(),
        config.fallback_cache_dir.clone(),
        config.fetch_timeout(),
    ));
    let pool = Arc::new(RendererPool::new(launcher));
    let pipeline = Arc::new(RenderPipeline::new(
        pool,
        assets,
        fonts,
        PipelineOptions::from(config),
    ));

    Ok(AppState { pipeline })
}

/// Build the API router with all endpoints and middleware.
///
/// This is the core router used by both production and tests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(handle_generate))
        .route("/api/ping", get(api::handle_ping))
        .route("/api/", get(api::handle_root))
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Add state and tracing
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// Wrapper handler to extract state components for the underlying API handler

async fn handle_generate(
    axum::extract::State(state): axum::extract::State<AppState>,
    payload: Result<axum::Json<RenderRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<axum::response::Response, ApiError> {
    api::handle_generate(axum::extract::State(state.pipeline), payload).await
}
