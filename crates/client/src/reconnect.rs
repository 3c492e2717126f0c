//! Reconnect policy: fixed interval, bounded attempts.

use std::time::Duration;

use sr_domain::config::ClientConfig;

/// Controls how the stream client reconnects after the transport drops.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// When `false`, a dropped stream leaves the client idle.
    pub enabled: bool,
    /// Fixed delay before every reconnect attempt.
    pub interval: Duration,
    /// Consecutive failed attempts allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

impl From<&ClientConfig> for ReconnectPolicy {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            enabled: cfg.auto_reconnect,
            interval: cfg.reconnect_interval(),
            max_attempts: cfg.max_reconnect_attempts,
        }
    }
}

/// What to do after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Auto-reconnect is off or the close was manual.
    Stay,
    /// The attempt cap has been reached.
    GiveUp,
    /// Retry after `delay`; `attempt` is the new attempt count (1-based).
    Retry { attempt: u32, delay: Duration },
}

impl ReconnectPolicy {
    /// Decide the next step given the attempts already made.
    pub fn decide(&self, attempts: u32, manual_close: bool) -> ReconnectDecision {
        if !self.enabled || manual_close {
            return ReconnectDecision::Stay;
        }
        if attempts >= self.max_attempts {
            return ReconnectDecision::GiveUp;
        }
        ReconnectDecision::Retry {
            attempt: attempts + 1,
            delay: self.interval,
        }
    }
}
