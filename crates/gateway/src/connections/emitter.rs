//! Streamed reply emitter.
//!
//! `emit` validates a send request synchronously, then hands the reply to a
//! background task that writes `message_start`, one `message_chunk` per
//! character, and `message_end` to the target connection.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sr_domain::config::EmitterConfig;
use sr_protocol::ServerEvent;
use tokio::task::JoinHandle;

use super::registry::{ConnectionRegistry, RegistryError};

/// Request-level rejection, raised before any frame is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
}

pub struct Emitter {
    registry: Arc<ConnectionRegistry>,
    config: EmitterConfig,
}

impl Emitter {
    pub fn new(registry: Arc<ConnectionRegistry>, config: EmitterConfig) -> Self {
        Self { registry, config }
    }

    /// Check that `message` can be streamed to `client_id`.
    pub fn validate(&self, client_id: Option<&str>, message: &str) -> Result<String, EmitError> {
        if message.trim().is_empty() {
            return Err(EmitError::InvalidArgument("empty message".into()));
        }
        let id = match client_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(EmitError::InvalidArgument("missing client id".into())),
        };
        if !self.registry.contains(id) {
            return Err(EmitError::NotFound("client not connected".into()));
        }
        Ok(id.to_string())
    }

    /// Validate, then stream the reply in the background.
    ///
    /// The returned handle resolves when the reply has been fully written or
    /// abandoned.  Callers acknowledge the request without awaiting it.
    pub fn emit(&self, client_id: Option<&str>, message: &str) -> Result<JoinHandle<()>, EmitError> {
        let id = self.validate(client_id, message)?;
        let reply = self.config.compose_reply(message);

        tracing::info!(client_id = %id, chars = reply.chars().count(), "streaming reply");

        let registry = self.registry.clone();
        let config = self.config.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = stream_reply(&registry, &config, &id, &reply).await {
                tracing::warn!(client_id = %id, error = %e, "reply interrupted");
                let notice = ServerEvent::reply_error("failed to deliver reply", e.to_string());
                if registry.send(&id, notice.to_frame()).await.is_err() {
                    registry.remove(&id);
                }
            }
        }))
    }
}

async fn stream_reply(
    registry: &ConnectionRegistry,
    config: &EmitterConfig,
    id: &str,
    reply: &str,
) -> Result<(), RegistryError> {
    tokio::time::sleep(Duration::from_millis(config.thinking_delay_ms)).await;
    registry.send(id, ServerEvent::reply_start().to_frame()).await?;

    for (index, ch) in reply.chars().enumerate() {
        registry
            .send(id, ServerEvent::reply_chunk(ch.to_string(), index).to_frame())
            .await?;
        tokio::time::sleep(chunk_delay(config)).await;
    }

    tokio::time::sleep(Duration::from_millis(config.end_delay_ms)).await;
    registry.send(id, ServerEvent::reply_end(reply).to_frame()).await?;

    tracing::debug!(client_id = %id, "reply complete");
    Ok(())
}

/// Uniform in `[chunk_delay_min_ms, chunk_delay_max_ms)`.
fn chunk_delay(config: &EmitterConfig) -> Duration {
    let (min, max) = (config.chunk_delay_min_ms, config.chunk_delay_max_ms);
    let ms = if max > min {
        rand::thread_rng().gen_range(min..max)
    } else {
        min
    };
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use sr_protocol::Frame;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<ConnectionRegistry>, Emitter) {
        let registry = Arc::new(ConnectionRegistry::new(Duration::from_secs(3600)));
        let emitter = Emitter::new(registry.clone(), EmitterConfig::default());
        (registry, emitter)
    }

    fn connect(registry: &Arc<ConnectionRegistry>) -> (String, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(64);
        let id = registry.admit(tx).unwrap();
        (id, rx)
    }

    async fn collect_until_end(rx: &mut mpsc::Receiver<Frame>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            let done = frame.event() == "message_end";
            frames.push(frame);
            if done {
                break;
            }
        }
        frames
    }

    #[tokio::test]
    async fn empty_message_is_rejected_first() {
        let (_, emitter) = setup();
        let err = emitter.emit(None, "   \n\t").unwrap_err();
        assert_eq!(err, EmitError::InvalidArgument("empty message".into()));
    }

    #[tokio::test]
    async fn missing_client_id_is_rejected() {
        let (_, emitter) = setup();
        assert_eq!(
            emitter.emit(None, "hi").unwrap_err(),
            EmitError::InvalidArgument("missing client id".into())
        );
        assert_eq!(
            emitter.emit(Some(""), "hi").unwrap_err(),
            EmitError::InvalidArgument("missing client id".into())
        );
    }

    #[tokio::test]
    async fn unknown_client_is_not_found() {
        let (_, emitter) = setup();
        assert_eq!(
            emitter.emit(Some("123-abcdefghi"), "hi").unwrap_err(),
            EmitError::NotFound("client not connected".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_message_writes_no_frames() {
        let (registry, emitter) = setup();
        let (id, mut rx) = connect(&registry);
        assert_eq!(rx.recv().await.unwrap().event(), "connected");

        assert!(emitter.emit(Some(id.as_str()), "  ").is_err());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn reply_frames_are_ordered_and_contiguous() {
        let (registry, emitter) = setup();
        let (id, mut rx) = connect(&registry);
        assert_eq!(rx.recv().await.unwrap().event(), "connected");

        let handle = emitter.emit(Some(id.as_str()), "hi").unwrap();
        let frames = collect_until_end(&mut rx).await;
        handle.await.unwrap();

        let expected =
            "Hello! I received your message: \"hi\". This is an SSE streaming response example.";
        assert_eq!(frames.len(), expected.chars().count() + 2);

        assert_eq!(frames[0].event(), "message_start");
        assert_eq!(frames[0].data()["type"], "start");

        let chunks = &frames[1..frames.len() - 1];
        let mut text = String::new();
        for (i, frame) in chunks.iter().enumerate() {
            assert_eq!(frame.event(), "message_chunk");
            assert_eq!(frame.data()["type"], "chunk");
            assert_eq!(frame.data()["index"], Value::from(i));
            text.push_str(frame.data()["content"].as_str().unwrap());
        }
        assert_eq!(text, expected);

        let end = frames.last().unwrap();
        assert_eq!(end.event(), "message_end");
        assert_eq!(end.data()["type"], "end");
        assert_eq!(end.data()["fullMessage"], expected);
    }

    #[tokio::test(start_paused = true)]
    async fn multibyte_characters_are_single_chunks() {
        let registry = Arc::new(ConnectionRegistry::new(Duration::from_secs(3600)));
        let config = EmitterConfig {
            reply_template: "{message}".into(),
            ..Default::default()
        };
        let emitter = Emitter::new(registry.clone(), config);
        let (id, mut rx) = connect(&registry);
        rx.recv().await.unwrap();

        emitter.emit(Some(id.as_str()), "héy✓").unwrap().await.unwrap();
        let frames = collect_until_end(&mut rx).await;
        let contents: Vec<&str> = frames[1..frames.len() - 1]
            .iter()
            .map(|f| f.data()["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["h", "é", "y", "✓"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_follows_config() {
        let registry = Arc::new(ConnectionRegistry::new(Duration::from_secs(3600)));
        let config = EmitterConfig {
            thinking_delay_ms: 500,
            chunk_delay_min_ms: 100,
            chunk_delay_max_ms: 100,
            end_delay_ms: 200,
            reply_template: "{message}".into(),
        };
        let emitter = Emitter::new(registry.clone(), config);
        let (id, mut rx) = connect(&registry);
        rx.recv().await.unwrap();

        let start = tokio::time::Instant::now();
        emitter.emit(Some(id.as_str()), "abc").unwrap().await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500 + 3 * 100 + 200));
        assert!(elapsed < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_stream_mid_reply_removes_connection() {
        let (registry, emitter) = setup();
        let (id, mut rx) = connect(&registry);
        rx.recv().await.unwrap();

        let handle = emitter.emit(Some(id.as_str()), "hello").unwrap();
        assert_eq!(rx.recv().await.unwrap().event(), "message_start");
        assert_eq!(rx.recv().await.unwrap().event(), "message_chunk");
        drop(rx);

        handle.await.unwrap();
        assert!(!registry.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn removed_connection_mid_reply_gets_no_more_frames() {
        let (registry, emitter) = setup();
        let (id, mut rx) = connect(&registry);
        rx.recv().await.unwrap();

        let handle = emitter.emit(Some(id.as_str()), "hello").unwrap();
        assert_eq!(rx.recv().await.unwrap().event(), "message_start");
        registry.remove(&id);

        handle.await.unwrap();
        let mut rest = Vec::new();
        while let Some(frame) = rx.recv().await {
            rest.push(frame.event().to_string());
        }
        assert!(rest.iter().all(|e| e == "message_chunk"));
        assert!(rest.len() <= 1);
    }

    #[test]
    fn chunk_delay_stays_in_range() {
        let config = EmitterConfig::default();
        for _ in 0..200 {
            let d = chunk_delay(&config);
            assert!(d >= Duration::from_millis(50) && d < Duration::from_millis(150));
        }
    }
}
