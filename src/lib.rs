//! Bidirectional TCP relay with optional `extern ` line framing.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod transport;

pub use config::RelayConfig;
pub use error::{RelayError, ServerError};
pub use server::{Handler, RelayHandler, Server};
pub use transport::{relay, transport_http, transport_tcp, FramingMode};
