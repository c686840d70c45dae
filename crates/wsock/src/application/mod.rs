//! Application layer for wsock.
//!
//! The application layer decides *what* to do with an open connection; the
//! infrastructure layer decides *how* bytes move.  It only sees connections
//! through the [`crate::infrastructure::Connection`] trait, so the same
//! session logic serves both protocol eras.

pub mod echo;

pub use echo::EchoSession;
