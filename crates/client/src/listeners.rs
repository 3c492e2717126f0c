//! Listener registry: maps event names to handler sets and fans frames out.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use sr_protocol::EventName;

/// A handler invoked with the decoded payload of each matching frame.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

/// Identifies one registration; pass it back to [`ListenerRegistry::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event multiplexer.
///
/// Lookups happen at dispatch time, so a handler registered while a stream
/// is already open receives the next frame carrying its event name.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventName, HashMap<ListenerId, EventHandler>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    pub fn on<F>(&self, event: impl Into<EventName>, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event = event.into();
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(event = %event, "listener added");
        self.handlers
            .lock()
            .entry(event)
            .or_default()
            .insert(id, Arc::new(handler));
        id
    }

    /// Unregister a handler.  Returns `false` if it was not registered.
    ///
    /// Removing the last handler for an event drops the event's entry.
    pub fn off(&self, event: impl Into<EventName>, id: ListenerId) -> bool {
        let event = event.into();
        let mut handlers = self.handlers.lock();
        let Some(set) = handlers.get_mut(&event) else {
            return false;
        };
        let removed = set.remove(&id).is_some();
        if set.is_empty() {
            handlers.remove(&event);
        }
        if removed {
            tracing::debug!(event = %event, "listener removed");
        }
        removed
    }

    /// Number of handlers currently registered for `event`.
    pub fn handler_count(&self, event: &EventName) -> usize {
        self.handlers.lock().get(event).map_or(0, HashMap::len)
    }

    /// Event names with at least one handler.
    pub fn event_names(&self) -> Vec<EventName> {
        self.handlers.lock().keys().cloned().collect()
    }

    /// Invoke every handler registered for `event`.
    ///
    /// Handlers run outside the lock, so they may register or remove
    /// listeners themselves.  A panicking handler is logged and skipped.
    /// Returns the number of handlers that completed normally.
    pub fn dispatch(&self, event: &EventName, data: &Value) -> usize {
        let snapshot: Vec<EventHandler> = match self.handlers.lock().get(event) {
            Some(set) => set.values().cloned().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(()) => delivered += 1,
                Err(_panic) => {
                    tracing::error!(event = %event, "event handler panicked");
                }
            }
        }
        delivered
    }
}
