//! Error types for the store boundary.
//!
//! All errors are propagated via [`StoreError`], which wraps the
//! underlying [`fred`] and [`serde_json`] errors. Callers in the engine
//! decide per call site whether a failure is critical or absorbed.

/// Errors that can occur at the blob store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("store backend error: {0}")]
    Backend(#[from] fred::error::Error),

    /// A blob could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration or environment error.
    #[error("store configuration error: {0}")]
    Config(String),
}
