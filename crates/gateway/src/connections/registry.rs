//! In-memory registry of open event streams.
//!
//! Each admitted connection owns an outbound frame channel (drained by the
//! HTTP body of `GET /connect`) and a heartbeat task.  Frames are committed
//! to the channel under the registry's read lock, so once `remove` returns no
//! further frame can reach that connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sr_domain::config::HeartbeatConfig;
use sr_protocol::{Frame, ServerEvent};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outbound side of a connection's stream body.
pub type FrameSink = mpsc::Sender<Frame>;

/// How long `shutdown` waits on a single full channel before giving up on it.
const SHUTDOWN_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} not found")]
    NotFound(String),
    #[error("delivery to connection {0} failed")]
    Delivery(String),
    #[error("registry is shutting down")]
    ShuttingDown,
}

/// A live connection.
struct Connection {
    sink: FrameSink,
    connected_at: DateTime<Utc>,
    /// Cancelled on removal; stops the heartbeat and voids in-flight writes.
    heartbeat: CancellationToken,
}

/// Thread-safe registry of all open streams.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Connection>>,
    heartbeat_interval: Duration,
    closed: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            heartbeat_interval,
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(cfg: &HeartbeatConfig) -> Self {
        Self::new(cfg.interval())
    }

    // ── Admission / removal ──────────────────────────────────────────

    /// Admit a new stream and return its id.
    ///
    /// The `connected` frame is queued before the connection becomes visible
    /// to `send` or `broadcast`, so it is always the first frame on the wire.
    pub fn admit(self: &Arc<Self>, sink: FrameSink) -> Result<String, RegistryError> {
        let heartbeat = CancellationToken::new();
        let id = {
            let mut conns = self.connections.write();
            if self.closed.load(Ordering::SeqCst) {
                return Err(RegistryError::ShuttingDown);
            }

            let mut id = generate_id();
            while conns.contains_key(&id) {
                id = generate_id();
            }

            sink.try_send(ServerEvent::connected(&id).to_frame())
                .map_err(|_| RegistryError::Delivery(id.clone()))?;

            conns.insert(
                id.clone(),
                Connection {
                    sink,
                    connected_at: Utc::now(),
                    heartbeat: heartbeat.clone(),
                },
            );
            id
        };

        tracing::info!(client_id = %id, total = self.len(), "client connected");
        self.spawn_heartbeat(id.clone(), heartbeat);
        Ok(id)
    }

    /// Remove a connection, stopping its heartbeat and closing its stream.
    /// Returns `false` if the id was not registered.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut conns = self.connections.write();
            let removed = conns.remove(id);
            if let Some(conn) = &removed {
                conn.heartbeat.cancel();
            }
            removed
        };

        match removed {
            Some(conn) => {
                let open_for = Utc::now().signed_duration_since(conn.connected_at);
                tracing::info!(
                    client_id = %id,
                    open_secs = open_for.num_seconds(),
                    "client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Guard that removes `id` when dropped (tied to the HTTP body).
    pub fn guard(self: &Arc<Self>, id: impl Into<String>) -> ConnectionGuard {
        ConnectionGuard {
            registry: Arc::downgrade(self),
            id: id.into(),
        }
    }

    // ── Delivery ─────────────────────────────────────────────────────

    /// Write `frame` to one connection.
    ///
    /// A dead transport removes the connection and yields
    /// [`RegistryError::Delivery`].  A connection removed while the write was
    /// waiting for channel capacity yields [`RegistryError::NotFound`].
    pub async fn send(&self, id: &str, frame: Frame) -> Result<(), RegistryError> {
        let (sink, token) = self
            .connections
            .read()
            .get(id)
            .map(|c| (c.sink.clone(), c.heartbeat.clone()))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        self.deliver(id, &sink, &token, frame).await
    }

    /// Write `frame` to every connection.  Returns how many accepted it.
    pub async fn broadcast(&self, frame: Frame) -> usize {
        let targets: Vec<(String, FrameSink, CancellationToken)> = self
            .connections
            .read()
            .iter()
            .map(|(id, c)| (id.clone(), c.sink.clone(), c.heartbeat.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sink, token) in targets {
            match self.deliver(&id, &sink, &token, frame.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::debug!(client_id = %id, error = %e, "broadcast skipped"),
            }
        }
        delivered
    }

    async fn deliver(
        &self,
        id: &str,
        sink: &FrameSink,
        token: &CancellationToken,
        frame: Frame,
    ) -> Result<(), RegistryError> {
        let permit = match sink.reserve().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(client_id = %id, event = frame.event(), "write failed, dropping client");
                self.remove(id);
                return Err(RegistryError::Delivery(id.to_string()));
            }
        };
        self.commit(id, token, permit, frame)
    }

    fn commit(
        &self,
        id: &str,
        token: &CancellationToken,
        permit: mpsc::Permit<'_, Frame>,
        frame: Frame,
    ) -> Result<(), RegistryError> {
        // `remove` cancels under the write lock; holding the read lock here
        // orders this write strictly before or after it.
        let _conns = self.connections.read();
        if token.is_cancelled() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        permit.send(frame);
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Number of open connections and their ids (sorted).
    pub fn count(&self) -> (usize, Vec<String>) {
        let mut ids: Vec<String> = self.connections.read().keys().cloned().collect();
        ids.sort();
        (ids.len(), ids)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Send `server_shutdown` to every connection, then close them all.
    ///
    /// Later admissions are refused.  Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let drained: Vec<(String, Connection)> = {
            let mut conns = self.connections.write();
            conns.drain().collect()
        };
        tracing::info!(connections = drained.len(), "closing all client streams");

        let frame = ServerEvent::server_shutdown("server is shutting down").to_frame();
        for (id, conn) in drained {
            conn.heartbeat.cancel();
            match tokio::time::timeout(SHUTDOWN_WRITE_TIMEOUT, conn.sink.send(frame.clone())).await
            {
                Ok(Ok(())) => {}
                Ok(Err(_)) => tracing::debug!(client_id = %id, "client already gone at shutdown"),
                Err(_) => tracing::warn!(client_id = %id, "shutdown notice timed out"),
            }
        }
    }

    // ── Heartbeat ────────────────────────────────────────────────────

    fn spawn_heartbeat(self: &Arc<Self>, id: String, token: CancellationToken) {
        let registry = Arc::downgrade(self);
        let period = self.heartbeat_interval;

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            // A send blocked on a full channel must not be followed by a burst.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(registry) = registry.upgrade() else {
                    break;
                };
                if let Err(e) = registry.send(&id, ServerEvent::heartbeat().to_frame()).await {
                    tracing::debug!(client_id = %id, error = %e, "heartbeat stopped");
                    break;
                }
                tracing::trace!(client_id = %id, "heartbeat sent");
            }
        });
    }
}

/// Removes its connection from the registry when dropped.
pub struct ConnectionGuard {
    registry: Weak<ConnectionRegistry>,
    id: String,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }
    }
}

/// `<unix millis>-<9 random chars>`.
fn generate_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &random[..9])
}
