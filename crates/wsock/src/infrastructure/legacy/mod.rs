//! Hixie-76 ("v0") handshake driver and connection.

pub mod connection;
pub mod handshake;

pub use connection::LegacyConnection;
pub use handshake::{accept_legacy, connect_legacy, connect_legacy_tcp};
