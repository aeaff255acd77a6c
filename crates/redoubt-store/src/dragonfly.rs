//! `Dragonfly` (Redis-compatible) blob store backend.
//!
//! Each blob lives at its path as a JSON string value. Prior versions
//! are kept in a capped list at `{path}#history` so the reconciler can
//! look a bounded distance into the past without a separate cold store.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `{path}` | JSON string | Current blob value |
//! | `{path}#history` | List | Prior versions, newest first |

use fred::prelude::*;
use fred::types::scan::Scanner;
use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::blob::BlobStore;
use crate::error::StoreError;

/// Suffix of the per-path prior-version list key.
const HISTORY_SUFFIX: &str = "#history";

/// Number of prior versions retained per path.
///
/// Matches the upper bound the reconciler is allowed to request; older
/// versions are trimmed away on write.
const MAX_HISTORY_VERSIONS: i64 = 30;

/// Batch size hint for SCAN pages.
const SCAN_PAGE_SIZE: u32 = 100;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] and implements [`BlobStore`] over
/// plain string keys. Clones share the same underlying connection.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Backend`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// The history list key for a blob path.
    fn history_key(path: &str) -> String {
        format!("{path}{HISTORY_SUFFIX}")
    }

    /// Collect every key matching `pattern`, history keys included.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut scanner = self.client.scan(pattern, Some(SCAN_PAGE_SIZE), None);
        while let Some(page) = scanner.next().await {
            let mut page = page?;
            if let Some(results) = page.take_results() {
                for key in results {
                    if let Some(name) = key.into_string() {
                        keys.push(name);
                    }
                }
            }
            page.next();
        }
        Ok(keys)
    }
}

impl BlobStore for DragonflyStore {
    async fn read_json<T>(&self, path: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let value: Option<String> = self.client.get(path).await?;
        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write_json<T>(&self, path: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;

        // Preserve the previous version before overwriting.
        let previous: Option<String> = self.client.get(path).await?;
        if let Some(old) = previous {
            let history = Self::history_key(path);
            let _: u64 = self.client.lpush(&history, old.as_str()).await?;
            let _: () = self
                .client
                .ltrim(&history, 0, MAX_HISTORY_VERSIONS.saturating_sub(1))
                .await?;
        }

        let _: () = self.client.set(path, json.as_str(), None, None, false).await?;
        tracing::debug!(path, "Wrote blob");
        Ok(())
    }

    async fn delete_json(&self, path: &str) -> Result<(), StoreError> {
        let _: u32 = self.client.del(path).await?;
        let _: u32 = self.client.del(Self::history_key(path).as_str()).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        let keys = self.scan_keys(&format!("{prefix}*")).await?;
        for key in &keys {
            let _: u32 = self.client.del(key.as_str()).await?;
        }
        tracing::debug!(prefix, count = keys.len(), "Deleted blobs under prefix");
        Ok(())
    }

    async fn list_pathnames(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = self.scan_keys(&format!("{prefix}*")).await?;
        keys.retain(|key| !key.ends_with(HISTORY_SUFFIX));
        Ok(keys)
    }

    async fn read_json_history<T>(&self, path: &str, depth: usize) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let stop = i64::try_from(depth).unwrap_or(i64::MAX).saturating_sub(1);
        let raw: Vec<String> = self
            .client
            .lrange(Self::history_key(path).as_str(), 0, stop)
            .await?;

        // Skip versions that no longer parse; history is best-effort.
        let mut versions = Vec::with_capacity(raw.len());
        for json in &raw {
            match serde_json::from_str(json) {
                Ok(value) => versions.push(value),
                Err(error) => {
                    tracing::warn!(path, %error, "Skipping unparseable history version");
                }
            }
        }
        Ok(versions)
    }
}
