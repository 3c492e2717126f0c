//! `POST /send`: queue a streamed reply for one connection.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::api_error;
use crate::connections::EmitError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Validates synchronously and acknowledges immediately; the reply itself
/// arrives later on the client's stream.
///
/// Bodies the JSON extractor refuses get the same `400 {error}` shape.
pub async fn send(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "send body rejected");
            return api_error(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };
    let message = req.message.unwrap_or_default();
    match state.emitter.emit(req.client_id.as_deref(), &message) {
        Ok(_) => Json(serde_json::json!({
            "success": true,
            "message": "message received",
        }))
        .into_response(),
        Err(e) => {
            let status = match e {
                EmitError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                EmitError::NotFound(_) => StatusCode::NOT_FOUND,
            };
            tracing::debug!(error = %e, status = status.as_u16(), "send rejected");
            api_error(status, e.to_string())
        }
    }
}
