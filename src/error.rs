//! Error types for the accept loop and the relay transports.

use std::io;
use thiserror::Error;

/// Errors returned by [`Server`](crate::server::Server).
#[derive(Debug, Error)]
pub enum ServerError {
    /// The default listener could not be bound.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),

    /// A fatal accept error ended the serve loop.
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The listener failed outside of accept (close, local address).
    #[error("Listener error: {0}")]
    Listener(#[source] io::Error),

    /// `serve` was called on a server that is already serving.
    #[error("Server already started")]
    AlreadyStarted,

    /// The server has been closed.
    #[error("Server closed")]
    Closed,

    /// No listener has been configured or bound yet.
    #[error("Server is not listening")]
    NotListening,
}

/// Errors that terminate one direction of a relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Reading from the source stream failed.
    #[error("read error: {0}")]
    Read(#[source] io::Error),

    /// Writing to the destination stream failed.
    #[error("write error: {0}")]
    Write(#[source] io::Error),

    /// The source closed in the middle of a message.
    #[error("stream closed inside a message ({len} bytes without newline)")]
    TruncatedMessage { len: usize },

    /// A message exceeded the line length limit.
    #[error("message exceeds {limit} bytes without newline")]
    MessageTooLong { limit: usize },

    /// Dialing the relay target failed.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// A directional copy task panicked.
    #[error("relay task failed: {0}")]
    Task(#[source] tokio::task::JoinError),

    /// Dialing the relay target timed out.
    #[error("connect to {target} timed out after {secs} seconds")]
    ConnectTimeout { target: String, secs: u64 },
}
