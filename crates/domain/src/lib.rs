//! `sr-domain`: configuration and error types shared by every StreamRelay crate.

pub mod config;
pub mod error;

pub use error::{Error, Result};
