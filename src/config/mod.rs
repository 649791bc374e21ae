//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → server_options() → options.rs mutators
//!     → merged once into ServerOptions when the accept loop starts
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod options;
pub mod schema;
pub mod validation;

pub use options::{ServerOption, ServerOptions};
pub use schema::{
    AcceptConfig, FramingConfig, ListenerConfig, ObservabilityConfig, RelayConfig, TargetConfig,
};
