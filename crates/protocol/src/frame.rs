use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Errors raised when building a frame by hand.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid event name: {0:?}")]
    InvalidEventName(String),
}

/// One named event plus its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    event: String,
    data: Value,
}

impl Frame {
    /// Build a frame, rejecting names that are empty or would break the
    /// line-oriented wire format.
    pub fn new(event: impl Into<String>, data: Value) -> Result<Self, ProtocolError> {
        let event = event.into();
        if event.is_empty() || event.contains(['\n', '\r']) {
            return Err(ProtocolError::InvalidEventName(event));
        }
        Ok(Self { event, data })
    }

    /// Names coming off the wire or from [`crate::EventName`] are already
    /// single-line.
    pub(crate) fn from_parts(event: String, data: Value) -> Self {
        Self { event, data }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

/// Current time in the wire timestamp format (`2024-05-01T12:00:00.000Z`).
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
