//! Error types for the callbacks crate.
//!
//! A single enum covers every failure mode a handler or the export-surface
//! validator can produce.

use thiserror::Error;

/// Result type alias for callback operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for callback operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The declared export surface does not match the expected reference set.
    ///
    /// `missing` holds names that were expected but not declared, `unexpected`
    /// holds names that were declared but not expected. Both are sorted so the
    /// diagnostic is stable across runs.
    #[error("export surface mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    ExportMismatch {
        /// Expected names absent from the declared surface.
        missing: Vec<String>,
        /// Declared names absent from the expected set.
        unexpected: Vec<String>,
    },

    /// IO error from a file-backed handler.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A human reviewer rejected a tool invocation.
    #[error("Human rejected tool input: {0}")]
    HumanRejected(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an export mismatch error from the two halves of the symmetric
    /// difference.
    pub fn export_mismatch(missing: Vec<String>, unexpected: Vec<String>) -> Self {
        Self::ExportMismatch {
            missing,
            unexpected,
        }
    }

    /// Create a human rejection error.
    pub fn human_rejected(input: impl Into<String>) -> Self {
        Self::HumanRejected(input.into())
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
