//! `GET /connect`: open a long-lived event stream.
//!
//! Flow:
//! 1. The registry admits the stream and queues `connected` with the new id
//! 2. Frames written through the registry are encoded onto the response body
//! 3. When the peer goes away the body is dropped and its guard removes the
//!    connection; when the registry removes it first, the body ends

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sr_protocol::{encode, Frame};
use tokio::sync::mpsc;

use super::api_error;
use crate::state::AppState;

/// Frames buffered per connection before writers wait.
const OUTBOUND_BUFFER: usize = 64;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

pub async fn connect(State(state): State<AppState>) -> Response {
    let (tx, mut rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);
    let id = match state.registry.admit(tx) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "stream refused");
            return api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
        }
    };

    let guard = state.registry.guard(id);
    let body = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(encode(&frame));
        }
    };

    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
