mod client;
mod observability;
mod server;
mod streaming;

pub use client::*;
pub use observability::*;
pub use server::*;
pub use streaming::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub emitter: EmitterConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a config from TOML text.  Missing sections fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the config at `path`, or the defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: &str| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message: message.into(),
            });
        };

        if self.server.port == 0 {
            push(
                ConfigSeverity::Error,
                "server.port",
                "port must be greater than 0",
            );
        }
        if self.server.host.is_empty() {
            push(ConfigSeverity::Error, "server.host", "host must not be empty");
        }

        if self.heartbeat.interval_secs == 0 {
            push(
                ConfigSeverity::Error,
                "heartbeat.interval_secs",
                "heartbeat interval must be greater than 0",
            );
        }

        if self.emitter.chunk_delay_min_ms > self.emitter.chunk_delay_max_ms {
            push(
                ConfigSeverity::Error,
                "emitter.chunk_delay_min_ms",
                "chunk_delay_min_ms must not exceed chunk_delay_max_ms",
            );
        }
        if !self.emitter.reply_template.contains("{message}") {
            push(
                ConfigSeverity::Warning,
                "emitter.reply_template",
                "template has no {message} placeholder; replies will not echo the input",
            );
        }

        if self.client.reconnect_interval_ms == 0 {
            push(
                ConfigSeverity::Warning,
                "client.reconnect_interval_ms",
                "zero reconnect interval retries immediately",
            );
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            push(
                ConfigSeverity::Warning,
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            );
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let issues = Config::default().validate();
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut config = Config::default();
        config.server.port = 0;
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn inverted_chunk_delay_is_an_error() {
        let mut config = Config::default();
        config.emitter.chunk_delay_min_ms = 200;
        config.emitter.chunk_delay_max_ms = 100;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.field == "emitter.chunk_delay_min_ms"));
    }

    #[test]
    fn template_without_placeholder_warns() {
        let mut config = Config::default();
        config.emitter.reply_template = "static reply".into();
        let issues = config.validate();
        let issue = issues
            .iter()
            .find(|i| i.field == "emitter.reply_template")
            .expect("template warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn wildcard_cors_warns() {
        let toml_str = r#"
[server.cors]
allowed_origins = ["*"]
"#;
        let config = Config::from_toml_str(toml_str).unwrap();
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.cors.allowed_origins"));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = Config::from_toml_str("[server\nport = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn config_error_display_includes_tag() {
        let e = ConfigError {
            severity: ConfigSeverity::Warning,
            field: "server.port".into(),
            message: "odd".into(),
        };
        assert_eq!(e.to_string(), "[WARN] server.port: odd");
    }
}
