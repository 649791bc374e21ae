//! Accepted connection abstraction and per-connection identifiers.
//!
//! # Responsibilities
//! - Define the duplex stream type handed from the accept loop to handlers
//! - Generate unique connection IDs for tracing

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A duplex byte stream with known endpoints.
///
/// Whoever holds the connection owns it; dropping it closes it.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Address of the remote peer.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Address of the local end.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Connection as produced by a [`Listener`](super::Listener).
pub type BoxedConnection = Box<dyn Connection>;

impl Connection for TcpStream {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }
}

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
