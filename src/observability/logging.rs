//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - A bare level ("debug") applies to this crate; full directives pass through

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Turn a configured level into a filter directive.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    match level {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => {
            format!("line_relay={level},warn")
        }
        other => other.to_string(),
    }
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
