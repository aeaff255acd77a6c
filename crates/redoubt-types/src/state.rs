//! The current (v2) stored schema and the derived read view.

use serde::{Deserialize, Serialize};

use crate::world::World;

/// The current persisted representation of one player (schema v2).
///
/// Stored as a single JSON blob at `game/{user}/state.json`. The
/// request-key window provides bounded idempotency: keys are appended
/// in insertion order and FIFO-evicted past the configured cap
/// (400 by default), so a retry arriving after that many other
/// mutations can re-apply. That window is a documented trade-off, not
/// exactly-once delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPlayerState {
    /// Schema discriminant; 2 for this representation.
    #[serde(default)]
    pub schema_version: u32,
    /// Wall-clock time of the last write of this blob (ms epoch).
    #[serde(default)]
    pub updated_at_ms: i64,
    /// The player's world.
    #[serde(default)]
    pub world: World,
    /// Recently applied idempotency keys, oldest first. Each key is
    /// trimmed and truncated before being recorded.
    #[serde(default)]
    pub request_keys: Vec<String>,
}

/// The read-time view of a player's state: stored world plus resource
/// production integrated up to "now".
///
/// Derived, never persisted. Repeated materialization of the same
/// stored state at the same instant is identical, and the balance is
/// non-decreasing as time advances with no intervening mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedState {
    /// The effective world. Its `balance` field already includes
    /// accrued production.
    pub world: World,
    /// Effective balance, clamped to the configured range.
    pub balance: i64,
    /// Stored revision; materialization never advances it.
    pub revision: u64,
    /// Timestamp of the last accepted mutation (ms epoch).
    pub last_mutation_ms: i64,
    /// Production accrued since the last mutation, already folded into
    /// `balance`.
    pub production_since_last_mutation: i64,
    /// Snapshot of the idempotency window at read time.
    pub request_keys: Vec<String>,
}
