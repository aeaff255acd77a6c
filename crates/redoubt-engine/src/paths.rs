//! Storage layout: where each player's blobs live.
//!
//! | Path | Contents |
//! |------|----------|
//! | `game/{user}/state.json` | Current (v2) state blob |
//! | `game/{user}/snapshot.json` | Legacy (v1) snapshot |
//! | `game/{user}/events/{id}` | Legacy (v1) event records |
//! | `game/{user}/world.json` | Deprecated standalone world |
//! | `game/{user}/wallet.json` | Deprecated standalone wallet |

/// Path of the current (v2) state blob.
pub(crate) fn state_path(user_id: &str) -> String {
    format!("game/{user_id}/state.json")
}

/// Path of the legacy (v1) snapshot.
pub(crate) fn snapshot_path(user_id: &str) -> String {
    format!("game/{user_id}/snapshot.json")
}

/// Prefix under which legacy (v1) events are stored.
pub(crate) fn events_prefix(user_id: &str) -> String {
    format!("game/{user_id}/events/")
}

/// Path of the deprecated standalone world record.
pub(crate) fn legacy_world_path(user_id: &str) -> String {
    format!("game/{user_id}/world.json")
}

/// Path of the deprecated standalone wallet record.
pub(crate) fn legacy_wallet_path(user_id: &str) -> String {
    format!("game/{user_id}/wallet.json")
}
