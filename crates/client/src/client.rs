//! Stream client: owns the transport lifecycle, frame dispatch, and the
//! reconnect state machine.

use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use sr_protocol::{EventName, Frame, FrameDecoder};
use tokio_util::sync::CancellationToken;

use crate::listeners::{ListenerId, ListenerRegistry};
use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use crate::transport::Transport;
use crate::types::{ClientError, ConnectionState};

/// A configured stream client.  Cheap to clone; clones share one connection.
///
/// Create via [`StreamClientBuilder`](crate::builder::StreamClientBuilder).
/// All methods are non-blocking; `connect` spawns the connection onto the
/// current Tokio runtime and must be called from within one.
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    listeners: ListenerRegistry,
    state: Mutex<ReconnectState>,
}

struct ReconnectState {
    status: ConnectionState,
    /// Consecutive reconnect attempts since the last successful open.
    attempts: u32,
    manual_close: bool,
    /// Set when the policy gave up; cleared by the next open.
    exhausted: bool,
    pending_timer: Option<CancellationToken>,
    /// Cancels the reader task of the current connection.
    connection: Option<CancellationToken>,
    /// Bumped on every connect and disconnect so stale tasks can tell they
    /// were superseded.
    generation: u64,
    client_id: Option<String>,
}

impl StreamClient {
    /// Start a new builder.
    pub fn builder() -> crate::builder::StreamClientBuilder {
        crate::builder::StreamClientBuilder::new()
    }

    pub(crate) fn new(transport: Arc<dyn Transport>, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                policy,
                listeners: ListenerRegistry::new(),
                state: Mutex::new(ReconnectState {
                    status: ConnectionState::Idle,
                    attempts: 0,
                    manual_close: false,
                    exhausted: false,
                    pending_timer: None,
                    connection: None,
                    generation: 0,
                    client_id: None,
                }),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the stream.
    ///
    /// Rejected with [`ClientError::AlreadyConnected`] while a connection is
    /// open or being opened.  Clears a previous manual close.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.start_connection(None)
    }

    /// Close the stream and suppress reconnection until the next `connect`.
    pub fn disconnect(&self) {
        let mut st = self.inner.state.lock();
        st.manual_close = true;
        if let Some(timer) = st.pending_timer.take() {
            timer.cancel();
        }
        st.status = ConnectionState::Closing;
        if let Some(conn) = st.connection.take() {
            conn.cancel();
        }
        st.generation += 1;
        st.client_id = None;
        st.status = ConnectionState::Idle;
        tracing::info!(transport = %self.inner.transport.describe(), "stream disconnected");
    }

    fn start_connection(&self, timer: Option<&CancellationToken>) -> Result<(), ClientError> {
        let (token, generation) = {
            let mut st = self.inner.state.lock();

            // A reconnect timer that lost a race with `disconnect` or a
            // manual `connect` must not open anything.
            if let Some(timer) = timer {
                if timer.is_cancelled() {
                    return Ok(());
                }
            }

            if matches!(st.status, ConnectionState::Open | ConnectionState::Connecting) {
                tracing::warn!(status = %st.status, "connect ignored: already connected");
                return Err(ClientError::AlreadyConnected);
            }

            st.manual_close = false;
            if let Some(pending) = st.pending_timer.take() {
                pending.cancel();
            }
            st.status = ConnectionState::Connecting;
            st.generation += 1;

            let token = CancellationToken::new();
            if let Some(old) = st.connection.replace(token.clone()) {
                old.cancel();
            }
            (token, st.generation)
        };

        tracing::info!(
            transport = %self.inner.transport.describe(),
            generation,
            "connecting"
        );

        let client = self.clone();
        tokio::spawn(async move { client.run_connection(token, generation).await });
        Ok(())
    }

    /// Single connection lifecycle: open -> read frames -> fail.
    async fn run_connection(self, token: CancellationToken, generation: u64) {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            r = self.inner.transport.open() => r,
        };

        let mut chunks = match opened {
            Ok(chunks) => chunks,
            Err(e) => {
                self.handle_failure(generation, e);
                return;
            }
        };

        if !self.mark_open(generation) {
            return;
        }

        let mut decoder = FrameDecoder::new();
        let failure = loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                next = chunks.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    for frame in decoder.push_bytes(&bytes) {
                        if token.is_cancelled() {
                            return;
                        }
                        self.dispatch(&frame);
                    }
                }
                Some(Err(e)) => break e,
                None => {
                    if let Some(frame) = decoder.finish() {
                        self.dispatch(&frame);
                    }
                    break ClientError::Transport("stream closed by server".into());
                }
            }
        };

        drop(chunks);
        if !token.is_cancelled() {
            self.handle_failure(generation, failure);
        }
    }

    fn mark_open(&self, generation: u64) -> bool {
        let mut st = self.inner.state.lock();
        if st.generation != generation {
            return false;
        }
        st.status = ConnectionState::Open;
        st.attempts = 0;
        st.exhausted = false;
        if let Some(timer) = st.pending_timer.take() {
            timer.cancel();
        }
        tracing::info!(transport = %self.inner.transport.describe(), "stream open");
        true
    }

    fn handle_failure(&self, generation: u64, err: ClientError) {
        {
            let mut st = self.inner.state.lock();
            if st.generation != generation || st.manual_close {
                return;
            }
            st.status = ConnectionState::Erroring;
            st.connection = None;
        }

        tracing::warn!(
            transport = %self.inner.transport.describe(),
            error = %err,
            "stream transport error"
        );
        self.inner
            .listeners
            .dispatch(&EventName::Error, &Value::String(err.to_string()));

        self.schedule_reconnect(generation);
    }

    fn schedule_reconnect(&self, generation: u64) {
        let mut st = self.inner.state.lock();
        // An error handler may have called connect or disconnect.
        if st.generation != generation || st.status != ConnectionState::Erroring {
            return;
        }

        match self.inner.policy.decide(st.attempts, st.manual_close) {
            ReconnectDecision::Stay => {
                st.status = ConnectionState::Idle;
                tracing::info!("auto-reconnect disabled or closed manually");
            }
            ReconnectDecision::GiveUp => {
                st.status = ConnectionState::Idle;
                st.exhausted = true;
                tracing::error!(
                    attempts = st.attempts,
                    "max reconnect attempts reached, giving up"
                );
            }
            ReconnectDecision::Retry { attempt, delay } => {
                st.attempts = attempt;
                st.status = ConnectionState::Reconnecting;

                let timer = CancellationToken::new();
                st.pending_timer = Some(timer.clone());

                tracing::info!(
                    attempt,
                    max_attempts = self.inner.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting"
                );

                let client = self.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            if let Err(e) = client.start_connection(Some(&timer)) {
                                tracing::debug!(error = %e, "scheduled reconnect skipped");
                            }
                        }
                        _ = timer.cancelled() => {}
                    }
                });
            }
        }
    }

    fn dispatch(&self, frame: &Frame) {
        let event = EventName::from(frame.event());
        tracing::trace!(event = %event, "frame received");
        self.inner.listeners.dispatch(&event, frame.data());
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Register a handler for `event`.  Takes effect on the next matching
    /// frame, whether or not the stream is open yet.
    pub fn on<F>(&self, event: impl Into<EventName>, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.listeners.on(event, handler)
    }

    /// Remove a handler registered with [`on`](Self::on).
    pub fn off(&self, event: impl Into<EventName>, id: ListenerId) -> bool {
        self.inner.listeners.off(event, id)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect attempts made since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.inner.state.lock().attempts
    }

    /// `true` once the reconnect policy gave up.  No further automatic
    /// connects happen until `connect` is called again.
    pub fn is_exhausted(&self) -> bool {
        self.inner.state.lock().exhausted
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    // ── Correlation id ───────────────────────────────────────────────

    /// Application-level id (usually the server-assigned `clientId`).
    /// Not used by the transport.
    pub fn client_id(&self) -> Option<String> {
        self.inner.state.lock().client_id.clone()
    }

    pub fn set_client_id(&self, id: impl Into<String>) {
        let id = id.into();
        tracing::debug!(client_id = %id, "client id set");
        self.inner.state.lock().client_id = Some(id);
    }
}
