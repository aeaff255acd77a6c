//! The [`BlobStore`] trait: the only interface the engine sees.
//!
//! Deliberately minimal. There is no compare-and-swap and no multi-key
//! transaction: every engine mutation is a whole read-modify-write
//! cycle, and concurrent writers for the same player can interleave at
//! the store level (an accepted lost-update window given low per-player
//! write concurrency).
//!
//! Methods return `impl Future + Send` rather than plain `async fn` so
//! generic callers can move store handles into spawned background
//! tasks (the fire-and-forget legacy cleanup does exactly that).

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// A blob-style key/value store holding JSON documents under path-like
/// keys.
pub trait BlobStore: Send + Sync {
    /// Read and deserialize the blob at `path`.
    ///
    /// Returns `Ok(None)` if the key does not exist. A present but
    /// undeserializable blob is an error; soft-failing callers decide
    /// whether to treat that as absent.
    fn read_json<T>(&self, path: &str) -> impl Future<Output = Result<Option<T>, StoreError>> + Send
    where
        T: DeserializeOwned + Send;

    /// Serialize `value` as JSON and store it at `path`, pushing any
    /// previous value onto the bounded prior-version history.
    fn write_json<T>(
        &self,
        path: &str,
        value: &T,
    ) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        T: Serialize + Sync;

    /// Delete the blob at `path`. Deleting a missing key is not an
    /// error.
    fn delete_json(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete every blob whose path starts with `prefix`.
    fn delete_prefix(&self, prefix: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// List every path starting with `prefix`, in unspecified order.
    fn list_pathnames(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Read up to `depth` prior versions of the blob at `path`, newest
    /// first. The current value is not included. Versions that no
    /// longer deserialize are skipped.
    fn read_json_history<T>(
        &self,
        path: &str,
        depth: usize,
    ) -> impl Future<Output = Result<Vec<T>, StoreError>> + Send
    where
        T: DeserializeOwned + Send;
}
