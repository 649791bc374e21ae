//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Accept error on the listener:
//!     → net::classify_accept_error (Transient or Fatal)
//!     → Transient: backoff.rs hands out the next delay, loop sleeps and retries
//!     → Fatal: serve loop stops
//! Successful accept:
//!     → backoff.rs reset
//! ```
//!
//! # Design Decisions
//! - No jitter: a single accept loop has no herd to spread out
//! - Backoff only ever delays the accept loop, never a handler task

pub mod backoff;

pub use backoff::AcceptBackoff;
