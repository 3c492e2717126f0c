pub mod cors;
pub mod send;
pub mod status;
pub mod stream;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/connect", get(stream::connect))
        .route("/send", post(send::send))
        .route("/count", get(status::count))
        .route("/health", get(status::health))
}

/// The full application: routes, CORS, and shared state.
pub fn app(state: AppState) -> Router {
    let cors_layer = cors::layer(&state.config.server.cors);
    router().layer(cors_layer).with_state(state)
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
