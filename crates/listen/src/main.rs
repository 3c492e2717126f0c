//! Console listener for a StreamRelay server.
//!
//! Opens the event stream, records the server-assigned client id, and
//! prints streamed replies as they arrive.  With `--say` it submits one
//! message once connected and exits after the reply ends.
//!
//! Usage:
//!   sr-listen http://localhost:3000/connect --say "hello"
//!
//! Reconnect settings come from the `[client]` section of the file named by
//! `SR_CONFIG` (default `config.toml`, defaults if absent).

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use serde_json::Value;
use sr_client::{
    send_message, Frame, ReplyPayload, ServerEvent, StreamClient, StreamClientBuilder,
};
use sr_domain::config::Config;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sr-listen", version, about = "Listen to a StreamRelay event stream")]
struct Args {
    /// Stream endpoint (defaults to `[client] url`).
    url: Option<String>,
    /// Send this message once connected, print the reply, then exit.
    #[arg(long)]
    say: Option<String>,
    /// Do not reconnect when the stream drops.
    #[arg(long)]
    no_reconnect: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let config_path = std::env::var("SR_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = Config::load(&config_path).with_context(|| format!("loading {config_path}"))?;

    let url = args.url.unwrap_or_else(|| config.client.url.clone());
    let mut builder = StreamClientBuilder::from_config(&config.client).url(url.clone());
    if args.no_reconnect {
        builder = builder.auto_reconnect(false);
    }
    let client = builder.build()?;

    let done = Arc::new(Notify::new());
    wire_handlers(&client, base_url(&url), args.say, done.clone());

    tracing::info!(url = %url, "connecting");
    client.connect()?;

    let mut exhausted_check = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = done.notified() => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            _ = exhausted_check.tick() => {
                if client.is_exhausted() {
                    client.disconnect();
                    anyhow::bail!("gave up after {} reconnect attempts", client.policy().max_attempts);
                }
            }
        }
    }

    client.disconnect();
    Ok(())
}

fn wire_handlers(client: &StreamClient, base: String, say: Option<String>, done: Arc<Notify>) {
    let handle = client.clone();
    let exit_after_reply = say.is_some();
    let pending_say = Arc::new(Mutex::new(say));

    client.on("connected", move |data: &Value| {
        let Some(ServerEvent::Connected(connected)) = decode("connected", data) else {
            tracing::warn!(payload = %data, "malformed connected frame");
            return;
        };
        let id = connected.client_id;
        handle.set_client_id(id.clone());
        tracing::info!(client_id = %id, "connected");

        let message = pending_say.lock().take();
        if let Some(message) = message {
            let base = base.clone();
            tokio::spawn(async move {
                let http = reqwest::Client::new();
                if let Err(e) = send_message(&http, &base, &id, &message).await {
                    tracing::error!(error = %e, "send failed");
                }
            });
        }
    });

    client.on("message_start", |_: &Value| {
        print!("< ");
        let _ = std::io::stdout().flush();
    });

    client.on("message_chunk", |data: &Value| {
        if let Some(ServerEvent::Reply(ReplyPayload::Chunk { content, .. })) =
            decode("message_chunk", data)
        {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
    });

    let reply_done = done.clone();
    client.on("message_end", move |_: &Value| {
        println!();
        if exit_after_reply {
            reply_done.notify_one();
        }
    });

    client.on("heartbeat", |data: &Value| {
        tracing::debug!(timestamp = %data["timestamp"], "heartbeat");
    });

    // Server error frames carry a payload; transport failures arrive as a string.
    client.on("error", |data: &Value| match decode("error", data) {
        Some(ServerEvent::Reply(ReplyPayload::Error { message, error, .. })) => {
            println!();
            tracing::warn!(%message, %error, "reply failed");
        }
        _ => tracing::warn!(error = %data, "stream error"),
    });

    client.on("server_shutdown", move |data: &Value| {
        match decode("server_shutdown", data) {
            Some(ServerEvent::ServerShutdown(notice)) => {
                tracing::info!(message = %notice.message, "server shutting down");
            }
            _ => tracing::info!("server shutting down"),
        }
        done.notify_one();
    });
}

/// Typed view of a delivered payload, `None` when it doesn't match `event`.
fn decode(event: &str, data: &Value) -> Option<ServerEvent> {
    let frame = Frame::new(event, data.clone()).ok()?;
    ServerEvent::from_frame(&frame)
}

/// Server root for `POST /send`, derived from the stream url.
fn base_url(stream_url: &str) -> String {
    let trimmed = stream_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/connect")
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_connect_path() {
        assert_eq!(base_url("http://localhost:3000/connect"), "http://localhost:3000");
        assert_eq!(base_url("http://localhost:3000/connect/"), "http://localhost:3000");
        assert_eq!(base_url("http://localhost:3000"), "http://localhost:3000");
    }

    #[test]
    fn decode_reads_typed_payloads() {
        let chunk = serde_json::json!({
            "type": "chunk", "content": "H", "index": 0, "timestamp": "t"
        });
        assert!(matches!(
            decode("message_chunk", &chunk),
            Some(ServerEvent::Reply(ReplyPayload::Chunk { content, index: 0, .. })) if content == "H"
        ));

        let connected = serde_json::json!({
            "clientId": "1-abcdefghi", "message": "connected", "timestamp": "t"
        });
        assert!(matches!(
            decode("connected", &connected),
            Some(ServerEvent::Connected(p)) if p.client_id == "1-abcdefghi"
        ));
    }

    #[test]
    fn decode_rejects_transport_errors_and_mismatches() {
        let transport = Value::String("transport: stream closed by server".into());
        assert!(decode("error", &transport).is_none());

        let start = serde_json::json!({ "type": "start", "timestamp": "t" });
        assert!(decode("message_chunk", &start).is_none());
    }

    #[test]
    fn parses_say_flag() {
        let args = Args::try_parse_from(["sr-listen", "http://h/connect", "--say", "hi"]).unwrap();
        assert_eq!(args.url.as_deref(), Some("http://h/connect"));
        assert_eq!(args.say.as_deref(), Some("hi"));
        assert!(!args.no_reconnect);
    }
}
