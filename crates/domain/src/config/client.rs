use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Defaults for stream consumers (the `sr-listen` demo reads this section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Stream endpoint, e.g. `http://127.0.0.1:3000/connect`.
    #[serde(default = "d_url")]
    pub url: String,
    #[serde(default = "d_true")]
    pub auto_reconnect: bool,
    /// Fixed delay before each reconnect attempt.
    #[serde(default = "d_reconnect_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "d_max_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            auto_reconnect: true,
            reconnect_interval_ms: d_reconnect_ms(),
            max_reconnect_attempts: d_max_attempts(),
        }
    }
}

impl ClientConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

fn d_url() -> String {
    "http://127.0.0.1:3000/connect".into()
}
fn d_true() -> bool {
    true
}
fn d_reconnect_ms() -> u64 {
    3000
}
fn d_max_attempts() -> u32 {
    5
}
