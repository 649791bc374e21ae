//! Relay transport subsystem.
//!
//! # Data Flow
//! ```text
//! accepted connection ─┐                          ┌─ dialed connection
//!                      ├─ pair.rs (two tasks) ────┤
//!                      │   plain:  pool.rs buffer copy, both ways
//!                      │   tcp:    framing add →, framing del ←
//!                      │   http:   framing del →, framing add ←
//! ```
//!
//! # Design Decisions
//! - First direction to finish decides the result; end of stream is success
//! - Each direction owns its read state (buffer or line reader)
//! - Buffers come from one shared bounded pool and return on drop

pub mod framing;
pub mod pair;
pub mod pool;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::RelayError;

pub use framing::{
    copy_add, copy_add_with_limit, copy_del, copy_del_with_limit, frame_add, frame_del, strip_marker,
    LineReader, MAX_MESSAGE_LEN,
};
pub use pair::{
    relay, relay_with_pool, transport_http, transport_http_with_limit, transport_tcp,
    transport_tcp_with_limit,
};
pub use pool::{BufferPool, PooledBuffer};

/// Which transport a relay runs between its two connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingMode {
    /// Bytes pass through untouched.
    #[default]
    Plain,
    /// Marker added toward the target, stripped on the way back.
    Tcp,
    /// Marker stripped toward the target, added on the way back.
    Http,
}

impl FramingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FramingMode::Plain => "plain",
            FramingMode::Tcp => "tcp",
            FramingMode::Http => "http",
        }
    }
}

impl std::fmt::Display for FramingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(FramingMode::Plain),
            "tcp" => Ok(FramingMode::Tcp),
            "http" => Ok(FramingMode::Http),
            other => Err(format!("unknown framing mode: {other} (expected plain, tcp or http)")),
        }
    }
}

/// Run the transport selected by `mode` between `listen_side` and `forward_side`.
///
/// `max_message_len` only applies to the framing modes.
pub async fn transport<A, B>(
    mode: FramingMode,
    listen_side: A,
    forward_side: B,
    max_message_len: usize,
) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    match mode {
        FramingMode::Plain => relay(listen_side, forward_side).await,
        FramingMode::Tcp => transport_tcp_with_limit(listen_side, forward_side, max_message_len).await,
        FramingMode::Http => transport_http_with_limit(listen_side, forward_side, max_message_len).await,
    }
}
