//! Client errors and connection states.

use std::fmt;

/// Errors surfaced by the stream client.
///
/// Exhausting reconnect attempts is not an error; it is reported through
/// [`StreamClient::is_exhausted`](crate::StreamClient::is_exhausted).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("config: {0}")]
    Config(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("transport: {0}")]
    Transport(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Where the client is in its connect / retry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Erroring,
    /// A reconnect timer is pending.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Erroring => "erroring",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}
