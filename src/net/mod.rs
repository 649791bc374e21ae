//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, close signal, error classification)
//!     → connection.rs (boxed duplex stream, connection id)
//!     → Hand off to the server's handler
//! ```
//!
//! # Design Decisions
//! - The accept loop only depends on the `Listener` trait, never on TCP
//! - Closing a listener wakes a pending accept with a fatal error
//! - Connections are boxed so handlers are transport-agnostic

pub mod connection;
pub mod listener;

pub use connection::{BoxedConnection, Connection, ConnectionId};
pub use listener::{classify_accept_error, ErrorClass, Listener, TcpListener};
