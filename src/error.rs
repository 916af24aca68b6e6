//! Error types shared across the crate.

use thiserror::Error;

/// Boxed error produced by user-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TimingError {
    /// The allow predicate failed while deciding whether to attach the trace.
    #[error("allow predicate failed: {0}")]
    Allow(#[source] BoxError),
}
