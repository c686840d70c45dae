//! Infrastructure layer: byte streams, HTTP heads, handshakes, connections
//! and the echo server.

pub mod connection;
pub mod http;
pub mod legacy;
pub mod server;
pub mod standard;
pub mod stream;

pub use connection::Connection;
pub use legacy::{accept_legacy, connect_legacy, connect_legacy_tcp, LegacyConnection};
pub use server::{run_server, serve_connection};
pub use standard::{accept_standard, connect_standard, connect_standard_tcp, StandardConnection};
pub use stream::ByteStream;
