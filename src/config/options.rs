//! Server options.
//!
//! Options are pure mutators over [`ServerOptions`], applied in order
//! before the accept loop starts. The merged record is never mutated
//! afterwards.

use std::time::Duration;

use crate::resilience::backoff::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF};

/// Settings the accept loop runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// First delay after a transient accept error.
    pub initial_backoff: Duration,
    /// Cap on the accept retry delay.
    pub max_backoff: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

/// A single option.
pub type ServerOption = Box<dyn Fn(&mut ServerOptions) + Send + Sync>;

/// Apply `opts` to `options` in order.
pub fn apply_options<I>(options: &mut ServerOptions, opts: I)
where
    I: IntoIterator<Item = ServerOption>,
{
    for opt in opts {
        opt(options);
    }
}

/// Set the first accept retry delay.
pub fn initial_backoff(delay: Duration) -> ServerOption {
    Box::new(move |opts| opts.initial_backoff = delay)
}

/// Set the accept retry delay cap.
pub fn max_backoff(delay: Duration) -> ServerOption {
    Box::new(move |opts| opts.max_backoff = delay)
}
