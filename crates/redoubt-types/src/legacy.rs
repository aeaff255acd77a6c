//! The deprecated (v1) persisted schema, retained read-only.
//!
//! Players created before the v2 single-blob schema have a snapshot at
//! `game/{user}/snapshot.json` and an ordered event log under
//! `game/{user}/events/`; the very oldest accounts may instead have
//! standalone `world.json` and `wallet.json` records. These artifacts
//! are replayed exactly once into a [`StoredPlayerState`] and then
//! best-effort deleted. Nothing ever writes these types back.
//!
//! [`StoredPlayerState`]: crate::state::StoredPlayerState

use serde::{Deserialize, Serialize};

use crate::patch::WorldPatch;
use crate::world::World;

/// A v1 snapshot: the world as of `created_at_ms` plus the balance the
/// event log's deltas apply on top of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySnapshot {
    /// When the snapshot was taken (ms epoch). Replay integrates
    /// production forward from this instant.
    #[serde(default)]
    pub created_at_ms: i64,
    /// The world at snapshot time.
    #[serde(default)]
    pub world: World,
    /// Balance at snapshot time, before replaying deltas.
    #[serde(default)]
    pub base_balance: i64,
}

/// The deprecated standalone wallet record (`wallet.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyWallet {
    /// Stored balance.
    #[serde(default)]
    pub balance: i64,
}

/// Payload of a v1 event, discriminated by its `kind` field.
///
/// The discriminant doubles as the structural type-guard: a record
/// whose `kind` is unrecognized fails deserialization and is silently
/// dropped by the migration loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegacyEventPayload {
    /// A structural change to the world.
    WorldPatch {
        /// The delta to apply.
        patch: WorldPatch,
    },
    /// A signed adjustment to the resource balance.
    ResourceDelta {
        /// Amount to add; negative spends.
        amount: i64,
    },
}

/// One record of the v1 event log.
///
/// Events are individually addressable blobs under the events prefix.
/// Replay order is `(timestamp_ms, id)`: the id tie-break keeps replay
/// deterministic when wall clocks collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEvent {
    /// Unique event id; doubles as the replay-order tie-break.
    #[serde(default)]
    pub id: String,
    /// When the event was recorded (ms epoch).
    #[serde(default)]
    pub timestamp_ms: i64,
    /// The event payload, tagged by `kind`.
    #[serde(flatten)]
    pub payload: LegacyEventPayload,
    /// Idempotency key of the originating request, if any. Carried for
    /// diagnostics only; replay applies every surviving event.
    #[serde(default)]
    pub request_key: Option<String>,
}

impl LegacyEvent {
    /// Structural guard applied while loading the event log.
    ///
    /// Events with a blank id or a negative timestamp are dropped
    /// before replay; they cannot be ordered deterministically.
    pub fn is_structurally_valid(&self) -> bool {
        !self.id.trim().is_empty() && self.timestamp_ms >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_kind_fails_deserialization() {
        let raw = r#"{"id":"e1","timestamp_ms":5,"kind":"teleport"}"#;
        let result: Result<LegacyEvent, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn resource_delta_round_trips() {
        let raw = r#"{"id":"e1","timestamp_ms":5,"kind":"resource_delta","amount":-30}"#;
        let result: Result<LegacyEvent, _> = serde_json::from_str(raw);
        assert!(result.is_ok());
        if let Ok(event) = result {
            assert!(event.is_structurally_valid());
            assert_eq!(
                event.payload,
                LegacyEventPayload::ResourceDelta { amount: -30 }
            );
        }
    }

    #[test]
    fn blank_id_fails_structural_guard() {
        let raw = r#"{"id":"  ","timestamp_ms":5,"kind":"resource_delta","amount":1}"#;
        let result: Result<LegacyEvent, _> = serde_json::from_str(raw);
        assert!(result.is_ok());
        if let Ok(event) = result {
            assert!(!event.is_structurally_valid());
        }
    }
}
