//! Domain layer for wsock.
//!
//! Pure types with no I/O: the messages a connection exchanges, its lifecycle
//! states, and the configuration structures.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio` stream or listener types
//! - Anything that reads or writes bytes on a socket

pub mod config;
pub mod message;

pub use config::{ConfigError, ConnectionConfig, ServerConfig};
pub use message::{ConnectionState, Message, ProtocolVersion, Role};
