//! `POST /send` helper: asks the server to stream a reply to a connection.

use serde_json::{json, Value};

use crate::types::ClientError;

/// Submit `message` for the connection identified by `client_id`.
///
/// `base_url` is the server root (e.g. `http://localhost:3000`).  Returns as
/// soon as the server acknowledges; the reply arrives on the stream.
pub async fn send_message(
    http: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    message: &str,
) -> Result<(), ClientError> {
    let url = format!("{}/send", base_url.trim_end_matches('/'));
    let response = http
        .post(&url)
        .json(&json!({ "message": message, "clientId": client_id }))
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let reason = body["error"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());

    Err(match status.as_u16() {
        400 => ClientError::InvalidArgument(reason),
        404 => ClientError::NotFound(reason),
        _ => ClientError::Transport(format!("send failed ({status}): {reason}")),
    })
}
