//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging → Bind listener → Serve
//!
//! Shutdown (signals.rs):
//!     SIGTERM/SIGINT → Server::close → accept loop returns
//! ```
//!
//! # Design Decisions
//! - In-flight relays are not drained; they end when their streams close

pub mod signals;

pub use signals::shutdown_signal;
