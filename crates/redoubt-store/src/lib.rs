//! Blob store boundary for the Redoubt persistence engine.
//!
//! The engine persists each player as a handful of JSON blobs under a
//! path-like key space. The store offers only read/write/delete/list
//! plus a bounded prior-version history -- no transactions, no
//! compare-and-swap, no schema enforcement. Everything transactional-
//! looking the engine provides is built on top of these primitives.
//!
//! # Modules
//!
//! - [`blob`] -- The [`BlobStore`] trait every backend implements
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) production backend
//! - [`memory`] -- In-process backend for tests and local tooling
//! - [`error`] -- Shared error type

pub mod blob;
pub mod dragonfly;
pub mod error;
pub mod memory;

// Re-export primary types for convenience.
pub use blob::BlobStore;
pub use dragonfly::DragonflyStore;
pub use error::StoreError;
pub use memory::MemoryStore;
