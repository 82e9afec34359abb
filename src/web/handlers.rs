use axum::{extract::State, http::Uri, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Fixed greeting served at `/`
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "👋🌎🚀",
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub namespace: String,
    pub sessions: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        namespace: state.namespace.name().to_string(),
        sessions: state.namespace.session_count(),
    })
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
