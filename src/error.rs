//! Crate-level error types
//!
//! Sequencing and registry conditions are resolved locally by the hold
//! manager and publish coordinator; only classifier-level and unexpected
//! faults reach the HTTP boundary, where they map to fixed status codes.

use thiserror::Error;

use crate::registry::RegistryError;

/// Error type for fanout operations
#[derive(Debug, Error)]
pub enum Error {
    /// Registry operation failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Segment gateway failure
    #[error("segment gateway error: {0}")]
    Gateway(String),

    /// I/O error (bind, accept)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fanout operations
pub type Result<T> = std::result::Result<T, Error>;
