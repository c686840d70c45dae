//! RFC 6455 ("v13") handshake driver and connection.

pub mod connection;
pub mod handshake;

pub use connection::StandardConnection;
pub use handshake::{accept_standard, connect_standard, connect_standard_tcp};
