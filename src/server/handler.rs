//! Connection handlers.
//!
//! # Responsibilities
//! - Define what the accept loop hands each connection to
//! - Echo handler used when nothing else is configured
//! - Relay handler: dial the target and run the selected transport

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use crate::error::RelayError;
use crate::net::BoxedConnection;
use crate::transport::pair::copy_buffer;
use crate::transport::{self, BufferPool, FramingMode};

/// Handles one accepted connection.
///
/// The returned future runs on its own task. It owns the connection and is
/// responsible for closing it; the accept loop never observes the outcome.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, conn: BoxedConnection) -> BoxFuture<'static, ()>;
}

/// Handler backed by an async closure.
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(BoxedConnection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    FnHandler(f)
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(BoxedConnection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, conn: BoxedConnection) -> BoxFuture<'static, ()> {
        Box::pin((self.0)(conn))
    }
}

/// Writes every byte it receives back to the peer.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    pool: Arc<BufferPool>,
}

impl EchoHandler {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }
}

impl Default for EchoHandler {
    fn default() -> Self {
        Self::new(BufferPool::global())
    }
}

impl Handler for EchoHandler {
    fn handle(&self, conn: BoxedConnection) -> BoxFuture<'static, ()> {
        let pool = Arc::clone(&self.pool);
        Box::pin(async move {
            let (mut reader, mut writer) = tokio::io::split(conn);
            match copy_buffer(&mut writer, &mut reader, &pool).await {
                Ok(()) => tracing::debug!("Echo connection closed"),
                Err(e) => tracing::debug!(error = %e, "Echo connection failed"),
            }
        })
    }
}

/// Dials a fixed target for every connection and relays between the two.
#[derive(Debug, Clone)]
pub struct RelayHandler {
    target: Arc<str>,
    mode: FramingMode,
    connect_timeout: Duration,
    max_message_len: usize,
}

impl RelayHandler {
    pub fn new(target: impl Into<String>, mode: FramingMode, connect_timeout: Duration) -> Self {
        Self {
            target: Arc::from(target.into()),
            mode,
            connect_timeout,
            max_message_len: transport::MAX_MESSAGE_LEN,
        }
    }

    /// Longest framed message accepted before a newline.
    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Handler for RelayHandler {
    fn handle(&self, conn: BoxedConnection) -> BoxFuture<'static, ()> {
        let handler = self.clone();
        Box::pin(async move {
            let started = Instant::now();
            let target = handler.target();

            let outbound = match connect(target, handler.connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(upstream = target, error = %e, "Failed to reach relay target");
                    return;
                }
            };

            tracing::debug!(upstream = target, mode = %handler.mode, "Relay established");

            match transport::transport(handler.mode, conn, outbound, handler.max_message_len).await {
                Ok(()) => tracing::debug!(
                    upstream = target,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Relay finished"
                ),
                Err(e) => tracing::warn!(upstream = target, error = %e, "Relay failed"),
            }
        })
    }
}

async fn connect(target: &str, timeout: Duration) -> Result<TcpStream, RelayError> {
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(RelayError::Connect {
            target: target.to_string(),
            source,
        }),
        Err(_) => Err(RelayError::ConnectTimeout {
            target: target.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}
