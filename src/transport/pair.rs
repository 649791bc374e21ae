//! Bidirectional transports between two duplex streams.
//!
//! Every transport spawns one task per direction and returns the result of
//! whichever finishes first. A finished direction shuts down the write half
//! it owns, then the other direction is aborted. Both streams are closed and
//! both buffers released by the time a transport returns.

use futures_util::future::{self, Either};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use super::framing::{copy_add_with_limit, copy_del_with_limit, MAX_MESSAGE_LEN};
use super::pool::BufferPool;
use crate::error::RelayError;

/// Plain byte relay using the global buffer pool.
pub async fn relay<A, B>(a: A, b: B) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    relay_with_pool(a, b, BufferPool::global()).await
}

/// Plain byte relay drawing its two buffers from `pool`.
pub async fn relay_with_pool<A, B>(a: A, b: B, pool: Arc<BufferPool>) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let forward_pool = Arc::clone(&pool);
    let forward = tokio::spawn(async move {
        let res = copy_buffer(&mut b_write, &mut a_read, &forward_pool).await;
        let _ = b_write.shutdown().await;
        res
    });

    let backward = tokio::spawn(async move {
        let res = copy_buffer(&mut a_write, &mut b_read, &pool).await;
        let _ = a_write.shutdown().await;
        res
    });

    first_finished(forward, backward).await
}

/// Copy bytes until end of stream through one pooled buffer.
pub async fn copy_buffer<R, W>(
    dst: &mut W,
    src: &mut R,
    pool: &Arc<BufferPool>,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = pool.acquire();
    let mut total: u64 = 0;

    loop {
        let n = src.read(&mut buf[..]).await.map_err(RelayError::Read)?;
        if n == 0 {
            tracing::trace!(bytes = total, "Copy reached end of stream");
            return Ok(());
        }
        dst.write_all(&buf[..n]).await.map_err(RelayError::Write)?;
        total += n as u64;
    }
}

#[derive(Debug, Clone, Copy)]
enum Transform {
    Add,
    Del,
}

async fn apply<R, W>(
    transform: Transform,
    dst: &mut W,
    src: R,
    max_message_len: usize,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match transform {
        Transform::Add => copy_add_with_limit(dst, src, max_message_len).await,
        Transform::Del => copy_del_with_limit(dst, src, max_message_len).await,
    }
}

/// Listener side (tcp) → forwarded side gets the marker added,
/// forwarded side → listener side has it stripped.
pub async fn transport_tcp<A, B>(rw1: A, rw2: B) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    transport_tcp_with_limit(rw1, rw2, MAX_MESSAGE_LEN).await
}

/// [`transport_tcp`] with an explicit line length limit.
pub async fn transport_tcp_with_limit<A, B>(rw1: A, rw2: B, max_message_len: usize) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    tracing::debug!(max_message_len, "Starting tcp-side framing transport");
    framed_pair(rw1, rw2, Transform::Add, Transform::Del, max_message_len).await
}

/// Listener side (http) → forwarded side has the marker stripped,
/// forwarded side → listener side gets it added.
pub async fn transport_http<A, B>(rw1: A, rw2: B) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    transport_http_with_limit(rw1, rw2, MAX_MESSAGE_LEN).await
}

/// [`transport_http`] with an explicit line length limit.
pub async fn transport_http_with_limit<A, B>(rw1: A, rw2: B, max_message_len: usize) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    tracing::debug!(max_message_len, "Starting http-side framing transport");
    framed_pair(rw1, rw2, Transform::Del, Transform::Add, max_message_len).await
}

async fn framed_pair<A, B>(
    rw1: A,
    rw2: B,
    outbound: Transform,
    inbound: Transform,
    max_message_len: usize,
) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (rw1_read, mut rw1_write) = tokio::io::split(rw1);
    let (rw2_read, mut rw2_write) = tokio::io::split(rw2);

    let forward = tokio::spawn(async move {
        let res = apply(outbound, &mut rw2_write, rw1_read, max_message_len).await;
        let _ = rw2_write.shutdown().await;
        res
    });

    let backward = tokio::spawn(async move {
        let res = apply(inbound, &mut rw1_write, rw2_read, max_message_len).await;
        let _ = rw1_write.shutdown().await;
        res
    });

    first_finished(forward, backward).await
}

/// Result of whichever direction completes first.
///
/// The other direction is aborted and joined before returning, so its
/// stream halves and buffer are dropped by then.
async fn first_finished(
    a: JoinHandle<Result<(), RelayError>>,
    b: JoinHandle<Result<(), RelayError>>,
) -> Result<(), RelayError> {
    let (joined, other) = match future::select(a, b).await {
        Either::Left((res, other)) | Either::Right((res, other)) => (res, other),
    };

    other.abort();
    if let Err(e) = other.await {
        if e.is_panic() {
            tracing::debug!(error = %e, "Sibling relay direction panicked");
        }
    }

    match joined {
        Ok(res) => res,
        Err(e) => Err(RelayError::Task(e)),
    }
}
