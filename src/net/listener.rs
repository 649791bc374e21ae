//! Listening endpoint abstraction and the default TCP listener.
//!
//! # Responsibilities
//! - Define what the accept loop needs from a listener (accept, close, addr)
//! - Classify accept errors as transient or fatal
//! - Provide a plain TCP listener that can be closed while an accept is pending

use futures_util::future::BoxFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use super::connection::BoxedConnection;

/// How the accept loop should react to an accept error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recoverable; retry after a backoff delay.
    Transient,
    /// Unrecoverable; stop serving.
    Fatal,
}

/// A network endpoint that accepts connections from peers.
///
/// Implementations decide how connections are produced (plain TCP, TLS, ...).
/// `close` and `local_addr` must be callable while an `accept` is pending.
pub trait Listener: Send + Sync + 'static {
    /// Wait for the next inbound connection.
    fn accept(&self) -> BoxFuture<'_, io::Result<(BoxedConnection, SocketAddr)>>;

    /// Stop accepting. Pending and future accepts fail with a fatal error.
    fn close(&self) -> io::Result<()>;

    /// Address this listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Classify an error returned by [`accept`](Self::accept).
    fn classify(&self, err: &io::Error) -> ErrorClass {
        classify_accept_error(err)
    }
}

/// Default classification of accept errors.
///
/// Aborted or reset handshakes, interrupts, timeouts and descriptor or
/// memory exhaustion are transient. Everything else is fatal.
pub fn classify_accept_error(err: &io::Error) -> ErrorClass {
    use io::ErrorKind::*;

    if matches!(
        err.kind(),
        ConnectionAborted | ConnectionReset | Interrupted | WouldBlock | TimedOut
    ) {
        return ErrorClass::Transient;
    }

    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        if matches!(code, libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM) {
            return ErrorClass::Transient;
        }
    }

    ErrorClass::Fatal
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

/// Plain TCP listener.
pub struct TcpListener {
    /// `None` once closed.
    inner: Mutex<Option<Arc<tokio::net::TcpListener>>>,
    local_addr: SocketAddr,
    closed_tx: watch::Sender<bool>,
}

impl TcpListener {
    /// Bind to the given address (e.g. `"0.0.0.0:0"`).
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        Self::from_tokio(listener)
    }

    /// Wrap an already bound tokio listener.
    pub fn from_tokio(listener: tokio::net::TcpListener) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (closed_tx, _) = watch::channel(false);

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: Mutex::new(Some(Arc::new(listener))),
            local_addr,
            closed_tx,
        })
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    fn current(&self) -> Option<Arc<tokio::net::TcpListener>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed || closed.changed().await.is_err() {
            return;
        }
    }
}

impl Listener for TcpListener {
    fn accept(&self) -> BoxFuture<'_, io::Result<(BoxedConnection, SocketAddr)>> {
        Box::pin(async move {
            let closed = self.closed_tx.subscribe();
            let listener = self.current().ok_or_else(closed_error)?;

            tokio::select! {
                res = listener.accept() => {
                    let (stream, peer_addr) = res?;
                    tracing::debug!(peer_addr = %peer_addr, "Connection accepted");
                    Ok((Box::new(stream) as BoxedConnection, peer_addr))
                }
                _ = wait_closed(closed) => Err(closed_error()),
            }
        })
    }

    fn close(&self) -> io::Result<()> {
        let taken = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if taken.is_some() {
            self.closed_tx.send_replace(true);
            tracing::info!(address = %self.local_addr, "Listener closed");
        }
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn transient_kinds() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
            io::ErrorKind::WouldBlock,
            io::ErrorKind::TimedOut,
        ] {
            assert_eq!(classify_accept_error(&io::Error::from(kind)), ErrorClass::Transient);
        }
    }

    #[cfg(unix)]
    #[test]
    fn descriptor_exhaustion_is_transient() {
        let err = io::Error::from_raw_os_error(libc::EMFILE);
        assert_eq!(classify_accept_error(&err), ErrorClass::Transient);
        let err = io::Error::from_raw_os_error(libc::ENFILE);
        assert_eq!(classify_accept_error(&err), ErrorClass::Transient);
    }

    #[test]
    fn other_errors_are_fatal() {
        assert_eq!(classify_accept_error(&closed_error()), ErrorClass::Fatal);
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(classify_accept_error(&err), ErrorClass::Fatal);
    }

    #[tokio::test]
    async fn accepts_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (mut conn, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, client.local_addr().unwrap());

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn close_unblocks_pending_accept() {
        let listener = Arc::new(TcpListener::bind("127.0.0.1:0").await.unwrap());

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.accept().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        listener.close().unwrap();
        let err = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .expect("accept should wake up")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(listener.classify(&err), ErrorClass::Fatal);
        assert!(listener.is_closed());
    }

    #[tokio::test]
    async fn accept_after_close_fails_and_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.close().unwrap();
        listener.close().unwrap();
        assert!(listener.accept().await.is_err());
    }
}
