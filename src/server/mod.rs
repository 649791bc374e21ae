//! Accept loop.
//!
//! # Data Flow
//! ```text
//! Server::serve
//!     → merge options (init + serve arguments, then frozen)
//!     → listener (configured, or default TCP on 0.0.0.0:0)
//!     → loop: accept
//!         ok        → reset backoff, spawn handler.handle(conn)
//!         transient → sleep(backoff.next_delay()), retry
//!         fatal     → state Closed, return the error
//! ```
//!
//! # Design Decisions
//! - A server serves at most once: Idle → Serving → Closed
//! - Handler tasks are fire-and-forget; the loop never awaits them
//! - `close` and `addr` take `&self` so they can run beside `serve`

pub mod handler;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::Instrument;

use crate::config::options::{apply_options, ServerOption, ServerOptions};
use crate::error::ServerError;
use crate::net::{ConnectionId, ErrorClass, Listener, TcpListener};
use crate::resilience::AcceptBackoff;

pub use handler::{handler_fn, EchoHandler, FnHandler, Handler, RelayHandler};

/// Address the default listener binds to.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:0";

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Serving,
    Closed,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ServerState::Idle,
            1 => ServerState::Serving,
            _ => ServerState::Closed,
        }
    }
}

/// Accepts connections and dispatches each to a [`Handler`].
pub struct Server {
    listener: OnceCell<Arc<dyn Listener>>,
    handler: Option<Arc<dyn Handler>>,
    options: Option<ServerOptions>,
    state: AtomicU8,
}

impl Server {
    /// A server with no listener, handler or options yet.
    pub fn new() -> Self {
        Self {
            listener: OnceCell::new(),
            handler: None,
            options: None,
            state: AtomicU8::new(ServerState::Idle as u8),
        }
    }

    /// Serve on `listener` instead of the default TCP listener.
    pub fn with_listener<L: Listener>(mut self, listener: L) -> Self {
        self.listener = OnceCell::new_with(Some(Arc::new(listener) as Arc<dyn Listener>));
        self
    }

    /// Handler used when `serve` is not given one.
    pub fn with_handler<H: Handler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn with_options<I>(mut self, opts: I) -> Self
    where
        I: IntoIterator<Item = ServerOption>,
    {
        self.init(opts);
        self
    }

    /// Apply options on top of any applied earlier.
    pub fn init<I>(&mut self, opts: I)
    where
        I: IntoIterator<Item = ServerOption>,
    {
        let options = self.options.get_or_insert_with(ServerOptions::default);
        apply_options(options, opts);
    }

    /// Options as applied so far, without those passed to `serve`.
    pub fn options(&self) -> ServerOptions {
        self.options.clone().unwrap_or_default()
    }

    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Bound address of the listener.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let listener = self.listener.get().ok_or(ServerError::NotListening)?;
        listener.local_addr().map_err(ServerError::Listener)
    }

    /// Stop serving and release the listener.
    pub fn close(&self) -> Result<(), ServerError> {
        self.state.store(ServerState::Closed as u8, Ordering::SeqCst);
        match self.listener.get() {
            Some(listener) => listener.close().map_err(ServerError::Listener),
            None => Ok(()),
        }
    }

    /// Serve with the configured handler and options.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.serve(None, Vec::new()).await
    }

    /// Accept connections until a fatal accept error or `close`.
    ///
    /// `handler` takes precedence over the configured one; without either,
    /// connections are echoed back. `opts` are applied after the options
    /// given to [`init`](Self::init).
    pub async fn serve(
        &self,
        handler: Option<Arc<dyn Handler>>,
        opts: Vec<ServerOption>,
    ) -> Result<(), ServerError> {
        self.start()?;

        let mut options = self.options();
        apply_options(&mut options, opts);
        let options = options;

        let listener = match self.listener.get_or_try_init(default_listener).await {
            Ok(listener) => Arc::clone(listener),
            Err(e) => {
                self.state.store(ServerState::Closed as u8, Ordering::SeqCst);
                return Err(ServerError::Bind(e));
            }
        };

        // close() may have run while the default listener was binding.
        if self.state() == ServerState::Closed {
            let _ = listener.close();
            return Err(ServerError::Closed);
        }

        let handler: Arc<dyn Handler> = handler
            .or_else(|| self.handler.clone())
            .unwrap_or_else(|| Arc::new(EchoHandler::default()));

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Server accepting connections");
        }

        let mut backoff = AcceptBackoff::new(options.initial_backoff, options.max_backoff);

        loop {
            match listener.accept().await {
                Ok((conn, peer_addr)) => {
                    backoff.reset();

                    let id = ConnectionId::new();
                    tracing::debug!(connection_id = %id, peer_addr = %peer_addr, "Dispatching connection");

                    let span = tracing::debug_span!("connection", connection_id = %id, peer_addr = %peer_addr);
                    tokio::spawn(handler.handle(conn).instrument(span));
                }
                Err(e) => match listener.classify(&e) {
                    ErrorClass::Transient => {
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "Accept error; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    ErrorClass::Fatal => {
                        self.state.store(ServerState::Closed as u8, Ordering::SeqCst);
                        tracing::info!(error = %e, "Accept loop stopped");
                        return Err(ServerError::Accept(e));
                    }
                },
            }
        }
    }

    fn start(&self) -> Result<(), ServerError> {
        match self.state.compare_exchange(
            ServerState::Idle as u8,
            ServerState::Serving as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(current) => match ServerState::from_u8(current) {
                ServerState::Closed => Err(ServerError::Closed),
                _ => Err(ServerError::AlreadyStarted),
            },
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

async fn default_listener() -> std::io::Result<Arc<dyn Listener>> {
    let listener = TcpListener::bind(DEFAULT_BIND_ADDRESS).await?;
    Ok(Arc::new(listener))
}
