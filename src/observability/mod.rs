//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! accept loop, handlers, transports
//!     → tracing events (connection_id, peer_addr, error fields)
//!     → logging.rs subscriber (EnvFilter + fmt)
//!     → stdout
//! ```

pub mod logging;

pub use logging::init_logging;
