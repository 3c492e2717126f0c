//! Known event names and the payload carried by each.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::{now_timestamp, Frame};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event names
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Event names understood by both ends, plus an open bucket for anything
/// else a server may emit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Default name for frames sent without an `event:` line.
    Message,
    /// Server `error` frames and client-side transport failures.
    Error,
    Connected,
    Heartbeat,
    MessageStart,
    MessageChunk,
    MessageEnd,
    ServerShutdown,
    Custom(String),
}

impl EventName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Error => "error",
            Self::Connected => "connected",
            Self::Heartbeat => "heartbeat",
            Self::MessageStart => "message_start",
            Self::MessageChunk => "message_chunk",
            Self::MessageEnd => "message_end",
            Self::ServerShutdown => "server_shutdown",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "message" => Self::Message,
            "error" => Self::Error,
            "connected" => Self::Connected,
            "heartbeat" => Self::Heartbeat,
            "message_start" => Self::MessageStart,
            "message_chunk" => Self::MessageChunk,
            "message_end" => Self::MessageEnd,
            "server_shutdown" => Self::ServerShutdown,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// First frame on every stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub client_id: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub timestamp: String,
}

/// Frames of one streamed reply, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReplyPayload {
    #[serde(rename = "start")]
    Start { timestamp: String },

    /// A single character of the reply at a 0-based position.
    #[serde(rename = "chunk")]
    Chunk {
        content: String,
        index: usize,
        timestamp: String,
    },

    #[serde(rename = "end")]
    End {
        #[serde(rename = "fullMessage")]
        full_message: String,
        timestamp: String,
    },

    /// The reply could not be completed; `error` carries the detail.
    #[serde(rename = "error")]
    Error {
        message: String,
        error: String,
        timestamp: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownPayload {
    pub message: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every event the relay server produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    Heartbeat(HeartbeatPayload),
    Reply(ReplyPayload),
    ServerShutdown(ShutdownPayload),
}

impl ServerEvent {
    pub fn connected(client_id: impl Into<String>) -> Self {
        Self::Connected(ConnectedPayload {
            client_id: client_id.into(),
            message: "connected".into(),
            timestamp: now_timestamp(),
        })
    }

    pub fn heartbeat() -> Self {
        Self::Heartbeat(HeartbeatPayload {
            timestamp: now_timestamp(),
        })
    }

    pub fn reply_start() -> Self {
        Self::Reply(ReplyPayload::Start {
            timestamp: now_timestamp(),
        })
    }

    pub fn reply_chunk(content: impl Into<String>, index: usize) -> Self {
        Self::Reply(ReplyPayload::Chunk {
            content: content.into(),
            index,
            timestamp: now_timestamp(),
        })
    }

    pub fn reply_end(full_message: impl Into<String>) -> Self {
        Self::Reply(ReplyPayload::End {
            full_message: full_message.into(),
            timestamp: now_timestamp(),
        })
    }

    pub fn reply_error(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Reply(ReplyPayload::Error {
            message: message.into(),
            error: error.into(),
            timestamp: now_timestamp(),
        })
    }

    pub fn server_shutdown(message: impl Into<String>) -> Self {
        Self::ServerShutdown(ShutdownPayload {
            message: message.into(),
        })
    }

    pub fn name(&self) -> EventName {
        match self {
            Self::Connected(_) => EventName::Connected,
            Self::Heartbeat(_) => EventName::Heartbeat,
            Self::Reply(ReplyPayload::Start { .. }) => EventName::MessageStart,
            Self::Reply(ReplyPayload::Chunk { .. }) => EventName::MessageChunk,
            Self::Reply(ReplyPayload::End { .. }) => EventName::MessageEnd,
            Self::Reply(ReplyPayload::Error { .. }) => EventName::Error,
            Self::ServerShutdown(_) => EventName::ServerShutdown,
        }
    }

    pub fn to_frame(&self) -> Frame {
        // Payloads are plain structs of strings and integers.
        let data = match self {
            Self::Connected(p) => serde_json::to_value(p),
            Self::Heartbeat(p) => serde_json::to_value(p),
            Self::Reply(p) => serde_json::to_value(p),
            Self::ServerShutdown(p) => serde_json::to_value(p),
        }
        .unwrap_or(serde_json::Value::Null);
        Frame::from_parts(self.name().as_str().to_string(), data)
    }

    /// Interpret a decoded frame.  Returns `None` for custom events and for
    /// payloads that don't match the shape of their name.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        let data = frame.data().clone();
        let event = match EventName::from(frame.event()) {
            EventName::Connected => Self::Connected(serde_json::from_value(data).ok()?),
            EventName::Heartbeat => Self::Heartbeat(serde_json::from_value(data).ok()?),
            EventName::ServerShutdown => {
                Self::ServerShutdown(serde_json::from_value(data).ok()?)
            }
            EventName::MessageStart
            | EventName::MessageChunk
            | EventName::MessageEnd
            | EventName::Error => Self::Reply(serde_json::from_value(data).ok()?),
            EventName::Message | EventName::Custom(_) => return None,
        };
        (event.name().as_str() == frame.event()).then_some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_map_both_ways() {
        for name in [
            "message",
            "error",
            "connected",
            "heartbeat",
            "message_start",
            "message_chunk",
            "message_end",
            "server_shutdown",
        ] {
            let parsed = EventName::from(name);
            assert!(!matches!(parsed, EventName::Custom(_)), "{name}");
            assert_eq!(parsed.as_str(), name);
        }
        assert_eq!(
            EventName::from("price_tick"),
            EventName::Custom("price_tick".into())
        );
    }

    #[test]
    fn connected_payload_uses_camel_case() {
        let frame = ServerEvent::connected("c1").to_frame();
        assert_eq!(frame.event(), "connected");
        assert_eq!(frame.data()["clientId"], "c1");
        assert!(frame.data()["timestamp"].is_string());
    }

    #[test]
    fn chunk_frame_shape() {
        let frame = ServerEvent::reply_chunk("H", 0).to_frame();
        assert_eq!(frame.event(), "message_chunk");
        assert_eq!(frame.data()["type"], "chunk");
        assert_eq!(frame.data()["content"], "H");
        assert_eq!(frame.data()["index"], 0);
    }

    #[test]
    fn end_frame_uses_full_message_key() {
        let frame = ServerEvent::reply_end("done").to_frame();
        assert_eq!(frame.event(), "message_end");
        assert_eq!(frame.data()["type"], "end");
        assert_eq!(frame.data()["fullMessage"], "done");
    }

    #[test]
    fn error_frame_is_named_error() {
        let frame = ServerEvent::reply_error("failed", "broken pipe").to_frame();
        assert_eq!(frame.event(), "error");
        assert_eq!(frame.data()["type"], "error");
        assert_eq!(frame.data()["error"], "broken pipe");
    }

    #[test]
    fn shutdown_frame_has_only_message() {
        let frame = ServerEvent::server_shutdown("bye").to_frame();
        assert_eq!(frame.data(), &json!({ "message": "bye" }));
    }

    #[test]
    fn from_frame_recovers_typed_event() {
        let original = ServerEvent::reply_chunk("x", 7);
        let parsed = ServerEvent::from_frame(&original.to_frame()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn from_frame_rejects_mismatched_type_tag() {
        // A "start" payload under the message_end name.
        let frame = Frame::new("message_end", json!({"type": "start", "timestamp": "t"})).unwrap();
        assert!(ServerEvent::from_frame(&frame).is_none());
    }

    #[test]
    fn from_frame_ignores_custom_events() {
        let frame = Frame::new("ticker", json!({})).unwrap();
        assert!(ServerEvent::from_frame(&frame).is_none());
    }
}
