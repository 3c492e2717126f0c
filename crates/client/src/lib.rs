//! `sr-client`: consumer SDK for StreamRelay event streams.
//!
//! The client opens a long-lived `text/event-stream` response, decodes
//! frames, and hands each payload to the handlers registered for its event
//! name.  When the stream drops it reconnects after a fixed interval, up to
//! a bounded number of attempts.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Your app (CLI / service / test harness)                  │
//! │                                                           │
//! │   let client = StreamClientBuilder::new()                 │
//! │       .url("http://127.0.0.1:3000/connect")               │
//! │       .max_reconnect_attempts(5)                          │
//! │       .build()?;                                          │
//! │   client.on("message_chunk", |data| print(data));         │
//! │   client.connect()?;                                      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Connection lifecycle
//!
//! ```text
//! Idle ─connect()─▶ Connecting ─open─▶ Open
//!                       │                │ transport error / stream end
//!                       └──── error ─────┤
//!                                        ▼
//!                                    Erroring ──▶ Reconnecting ─timer─▶ Connecting
//!                                        │
//!                                        └─ manual close / cap reached ─▶ Idle
//! ```
//!
//! `disconnect()` moves through `Closing` to `Idle` from any state and
//! cancels a pending reconnect timer.

pub mod builder;
pub mod client;
pub mod listeners;
pub mod reconnect;
pub mod send;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::StreamClientBuilder;
pub use client::StreamClient;
pub use listeners::{EventHandler, ListenerId, ListenerRegistry};
pub use reconnect::ReconnectPolicy;
pub use send::send_message;
pub use transport::{ChunkStream, HttpTransport, Transport};
pub use types::{ClientError, ConnectionState};

// Re-export protocol types so consumers never need to import sr-protocol directly.
pub use sr_protocol::{EventName, Frame, ReplyPayload, ServerEvent};
