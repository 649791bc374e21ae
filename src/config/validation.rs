//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    // Targets may be host names, so only the shape is checked.
    let target = config.target.address.trim();
    if target.is_empty() {
        errors.push(ValidationError::new("target.address", "must not be empty"));
    } else if !has_port(target) {
        errors.push(ValidationError::new(
            "target.address",
            format!("'{}' must be host:port", target),
        ));
    }

    if config.target.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("target.connect_timeout_secs", "must be > 0"));
    }

    if config.framing.max_message_len == 0 {
        errors.push(ValidationError::new("framing.max_message_len", "must be > 0"));
    }

    if config.accept.initial_backoff_ms == 0 {
        errors.push(ValidationError::new("accept.initial_backoff_ms", "must be > 0"));
    }
    if config.accept.max_backoff_ms < config.accept.initial_backoff_ms {
        errors.push(ValidationError::new(
            "accept.max_backoff_ms",
            "must be >= accept.initial_backoff_ms",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn has_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
