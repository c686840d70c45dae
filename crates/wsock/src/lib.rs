//! wsock library crate.
//!
//! Async WebSocket connections for both protocol eras (Hixie-76 "v0" and
//! RFC 6455 "v13") over any tokio byte stream, plus the `wsock-echo` demo
//! server.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! [wsock]
//!   ├── domain/           Pure types: Message, ConnectionState, configs
//!   ├── application/      EchoSession: what to do with an open connection
//!   └── infrastructure/
//!         ├── stream/     Buffered byte stream shared by HTTP and frames
//!         ├── http/       Request/response head reader (httparse)
//!         ├── standard/   v13 handshake driver + StandardConnection
//!         ├── legacy/     v0 handshake driver + LegacyConnection
//!         └── server/     TCP accept loop
//! [wsock-core]            Frame codecs and pure handshake logic
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` sees connections only through the
//!   [`infrastructure::Connection`] trait.
//! - `infrastructure` owns every socket, buffer and task.
//!
//! # Example
//!
//! ```no_run
//! use wsock::domain::ConnectionConfig;
//! use wsock::infrastructure::{connect_standard_tcp, Connection};
//! use wsock_core::Headers;
//!
//! # async fn demo() -> Result<(), wsock::error::WsError> {
//! let config = ConnectionConfig::default();
//! let mut conn = connect_standard_tcp("127.0.0.1:6969", "/ws", &Headers::new(), config).await?;
//! conn.send(b"hello").await?;
//! while let Some(message) = conn.receive().await? {
//!     println!("{message:?}");
//! }
//! # Ok(())
//! # }
//! ```

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: session logic over a [`infrastructure::Connection`].
pub mod application;

/// Error type shared by handshakes and connections.
pub mod error;

/// Infrastructure layer: streams, handshakes, connections and the server.
pub mod infrastructure;

pub use error::WsError;
