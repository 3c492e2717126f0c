use std::sync::Arc;

use sr_domain::config::Config;

use crate::connections::{ConnectionRegistry, Emitter};

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ConnectionRegistry>,
    pub emitter: Arc<Emitter>,
}

impl AppState {
    /// Build the registry and emitter from `config`.
    pub fn new(config: Arc<Config>) -> Self {
        let registry = Arc::new(ConnectionRegistry::from_config(&config.heartbeat));
        let emitter = Arc::new(Emitter::new(registry.clone(), config.emitter.clone()));
        Self {
            config,
            registry,
            emitter,
        }
    }
}
