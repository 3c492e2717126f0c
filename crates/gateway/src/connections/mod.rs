//! Server side of the push channel: the connection registry and the
//! streamed reply emitter built on top of it.

pub mod emitter;
pub mod registry;

pub use emitter::{EmitError, Emitter};
pub use registry::{ConnectionGuard, ConnectionRegistry, FrameSink, RegistryError};
