//! Typed engine configuration.
//!
//! Every tunable the engine consults lives here and is injected where
//! it is used -- there are no module-level globals. All fields carry
//! serde defaults matching production values, so an empty YAML file is
//! a valid configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Tunables for the persistence and reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Upper bound of any resource balance.
    #[serde(default = "default_max_balance")]
    pub max_balance: i64,

    /// Balance granted to a freshly bootstrapped world.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,

    /// Size of the bounded idempotency window. Once exceeded, the
    /// oldest request keys are evicted first.
    #[serde(default = "default_max_request_keys")]
    pub max_request_keys: usize,

    /// Maximum stored length of a request key; longer keys are
    /// truncated, not rejected.
    #[serde(default = "default_request_key_max_len")]
    pub request_key_max_len: usize,

    /// Materialization attempts the reconciler makes before falling
    /// back to history. Clamped to `[1, 10]` at the point of use.
    #[serde(default = "default_materialize_attempts")]
    pub materialize_attempts: u32,

    /// Base retry backoff in milliseconds; attempt `n` sleeps
    /// `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How many prior versions the reconciler requests from the store.
    /// Clamped to `[4, 30]` at the point of use.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Schema discriminant written into every v2 state blob.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&contents)?)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Materialization attempt count clamped to its allowed range.
    pub fn materialize_attempts_clamped(&self) -> u32 {
        self.materialize_attempts.clamp(1, 10)
    }

    /// History depth clamped to its allowed range.
    pub fn history_depth_clamped(&self) -> usize {
        self.history_depth.clamp(4, 30)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_balance: default_max_balance(),
            starting_balance: default_starting_balance(),
            max_request_keys: default_max_request_keys(),
            request_key_max_len: default_request_key_max_len(),
            materialize_attempts: default_materialize_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            history_depth: default_history_depth(),
            schema_version: default_schema_version(),
        }
    }
}

const fn default_max_balance() -> i64 {
    2_000_000_000
}

const fn default_starting_balance() -> i64 {
    1_000
}

const fn default_max_request_keys() -> usize {
    400
}

const fn default_request_key_max_len() -> usize {
    160
}

const fn default_materialize_attempts() -> u32 {
    6
}

const fn default_retry_backoff_ms() -> u64 {
    100
}

const fn default_history_depth() -> usize {
    12
}

const fn default_schema_version() -> u32 {
    2
}
