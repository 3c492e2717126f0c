use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heartbeat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keep-alive frames written to every open stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between `heartbeat` frames on each connection.
    #[serde(default = "d_heartbeat_secs")]
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_heartbeat_secs(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Emitter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pacing of the simulated streamed reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Delay before `message_start`.
    #[serde(default = "d_thinking_ms")]
    pub thinking_delay_ms: u64,
    /// Lower bound (inclusive) of the per-character delay.
    #[serde(default = "d_chunk_min_ms")]
    pub chunk_delay_min_ms: u64,
    /// Upper bound (exclusive) of the per-character delay.
    #[serde(default = "d_chunk_max_ms")]
    pub chunk_delay_max_ms: u64,
    /// Delay between the last chunk and `message_end`.
    #[serde(default = "d_end_ms")]
    pub end_delay_ms: u64,
    /// Reply text; `{message}` is replaced with the submitted message.
    #[serde(default = "d_reply_template")]
    pub reply_template: String,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            thinking_delay_ms: d_thinking_ms(),
            chunk_delay_min_ms: d_chunk_min_ms(),
            chunk_delay_max_ms: d_chunk_max_ms(),
            end_delay_ms: d_end_ms(),
            reply_template: d_reply_template(),
        }
    }
}

impl EmitterConfig {
    /// Render the deterministic reply for `message`.
    pub fn compose_reply(&self, message: &str) -> String {
        self.reply_template.replace("{message}", message)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_heartbeat_secs() -> u64 {
    30
}
fn d_thinking_ms() -> u64 {
    500
}
fn d_chunk_min_ms() -> u64 {
    50
}
fn d_chunk_max_ms() -> u64 {
    150
}
fn d_end_ms() -> u64 {
    200
}
fn d_reply_template() -> String {
    "Hello! I received your message: \"{message}\". This is an SSE streaming response example."
        .into()
}
