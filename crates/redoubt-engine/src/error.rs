//! Error types for the engine.
//!
//! Very little in this crate propagates errors: validation defects are
//! coerced to defaults, best-effort I/O is absorbed with a warning, and
//! the reconciler returns its in-memory result even when the final
//! write-back fails. What remains is genuine critical-path store
//! failure from the plain mutation operations.

use redoubt_store::StoreError;

/// Errors surfaced by the engine's public operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A critical-path blob store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
