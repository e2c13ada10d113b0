use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api_errors::AppError;
use crate::app_state::AppState;
use crate::decision_composer::DecisionReport;
use crate::model_bundle::BundleSummary;
use crate::profile::DecisionRequest;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models_loaded: bool,
    pub bundle: BundleSummary,
}

/// Router exposing the decision endpoint, its aliases and health checks.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // current endpoint
        .route("/api/access/decide", post(decide))
        // versioned alias
        .route("/v1/access/decide", post(decide))
        // legacy alias
        .route("/predict", post(decide))
        // health endpoints
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/readyz", get(readyz))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn decide(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<DecisionReport>, AppError> {
    let Json(request) = body?;
    let request = state.validator.validate(request)?;
    let report = state.composer.decide(&request).await?;
    Ok(Json(report))
}

async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models_loaded: true,
        bundle: state.bundle.clone(),
    })
}

async fn readyz(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let ready = !state.bundle.fingerprint.is_empty();
    Json(serde_json::json!({ "ready": ready }))
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "access arbiter listening");
    axum::serve(listener, app).await?;
    Ok(())
}
