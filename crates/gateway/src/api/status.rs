//! Introspection endpoints.
//!
//! - `GET /count`:  ids of open streams
//! - `GET /health`: liveness plus the open stream count

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn count(State(state): State<AppState>) -> impl IntoResponse {
    let (count, clients) = state.registry.count();
    Json(serde_json::json!({
        "count": count,
        "clients": clients,
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": sr_protocol::now_timestamp(),
        "activeConnections": state.registry.len(),
    }))
}
