//! One-time replay of the deprecated v1 representation.
//!
//! Runs only when a player has no v2 state blob. Base resolution
//! order: v1 snapshot if present, else the deprecated standalone
//! world/wallet records, else a synthesized starter world. The event
//! log is then replayed deterministically in `(timestamp, id)` order,
//! integrating production across each gap, and the result is written
//! as v2. Legacy artifacts are deleted by a spawned background task
//! whose errors are swallowed -- cleanup is not on the correctness
//! path.

use redoubt_store::BlobStore;
use redoubt_types::{LegacyEvent, LegacyEventPayload, LegacySnapshot, LegacyWallet, StoredPlayerState, World};
use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::normalize::{clamp_balance, normalize_world};
use crate::patch::apply_patch;
use crate::paths;
use crate::production::ProductionModel;
use crate::starter::starter_world;

/// Read a blob, treating both absence and failure as absence.
///
/// Store reads off the critical write path fail soft: a read error is
/// logged and the caller proceeds as if the blob did not exist.
pub(crate) async fn read_json_soft<S, T>(store: &S, path: &str) -> Option<T>
where
    S: BlobStore,
    T: DeserializeOwned + Send,
{
    match store.read_json::<T>(path).await {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(path, %error, "Read failed; treating blob as absent");
            None
        }
    }
}

/// The starting point replay builds on.
struct MigrationBase {
    world: World,
    balance: i64,
    cursor_ms: i64,
}

/// Resolve the replay base from v1 artifacts, oldest schema last.
async fn load_base<S: BlobStore>(store: &S, user_id: &str) -> Option<MigrationBase> {
    if let Some(snapshot) = read_json_soft::<S, LegacySnapshot>(store, &paths::snapshot_path(user_id)).await
    {
        return Some(MigrationBase {
            cursor_ms: snapshot.created_at_ms.max(0),
            balance: snapshot.base_balance,
            world: snapshot.world,
        });
    }

    let world = read_json_soft::<S, World>(store, &paths::legacy_world_path(user_id)).await?;
    let wallet = read_json_soft::<S, LegacyWallet>(store, &paths::legacy_wallet_path(user_id)).await;
    Some(MigrationBase {
        cursor_ms: world.last_save_ms.max(0),
        balance: wallet.map_or(world.balance, |w| w.balance),
        world,
    })
}

/// Load, guard-filter, and deterministically order the v1 event log.
///
/// Records that fail to read or parse are dropped with a warning;
/// records that parse but fail the structural guard are dropped
/// silently. The id tie-break keeps replay order stable when wall
/// clocks collide.
async fn load_events<S: BlobStore>(store: &S, user_id: &str) -> Vec<LegacyEvent> {
    let prefix = paths::events_prefix(user_id);
    let pathnames = match store.list_pathnames(&prefix).await {
        Ok(pathnames) => pathnames,
        Err(error) => {
            tracing::warn!(prefix, %error, "Event listing failed; migrating without events");
            Vec::new()
        }
    };

    let mut events = Vec::with_capacity(pathnames.len());
    for path in &pathnames {
        let Some(event) = read_json_soft::<S, LegacyEvent>(store, path).await else {
            continue;
        };
        if event.is_structurally_valid() {
            events.push(event);
        } else {
            tracing::debug!(path, "Dropping structurally invalid legacy event");
        }
    }
    events.sort_by(|a, b| {
        (a.timestamp_ms, a.id.as_str()).cmp(&(b.timestamp_ms, b.id.as_str()))
    });
    events
}

/// Migrate a player's v1 artifacts into a v2 state blob.
///
/// Returns `Ok(None)` when the player has no legacy data at all (the
/// caller bootstraps a starter world instead). On success the v2 blob
/// has been written and background cleanup of the v1 artifacts has
/// been scheduled.
///
/// # Errors
///
/// Returns [`EngineError::Store`] only if the final v2 write fails;
/// every legacy read is best-effort.
pub(crate) async fn migrate_legacy_state<S, P>(
    store: &S,
    production: &P,
    config: &EngineConfig,
    user_id: &str,
    username: &str,
    now_ms: i64,
) -> Result<Option<StoredPlayerState>, EngineError>
where
    S: BlobStore + Clone + 'static,
    P: ProductionModel,
{
    let base = load_base(store, user_id).await;
    let events = load_events(store, user_id).await;
    if base.is_none() && events.is_empty() {
        return Ok(None);
    }

    let base = base.unwrap_or_else(|| {
        // Events without any base record: start from the starter
        // template at the first event's timestamp so no production
        // accrues before the log begins.
        let cursor_ms = events.first().map_or(now_ms, |e| e.timestamp_ms).max(0);
        MigrationBase {
            world: starter_world(user_id, username, cursor_ms, config),
            balance: config.starting_balance,
            cursor_ms,
        }
    });

    let mut world = normalize_world(&base.world, user_id, username, config);
    let mut balance = clamp_balance(base.balance, config);
    let mut revision = world.revision;
    let mut cursor_ms = base.cursor_ms.max(0);

    for event in &events {
        // Production first: the interval up to this event accrues at
        // the building configuration in effect before the event.
        let produced = production
            .produced_between(&world, cursor_ms, event.timestamp_ms)
            .max(0);
        balance = clamp_balance(balance.saturating_add(produced), config);

        match &event.payload {
            LegacyEventPayload::WorldPatch { patch } => {
                world = normalize_world(&apply_patch(&world, patch), user_id, username, config);
            }
            LegacyEventPayload::ResourceDelta { amount } => {
                balance = clamp_balance(balance.saturating_add(*amount), config);
            }
        }

        revision = revision.saturating_add(1);
        cursor_ms = event.timestamp_ms.max(cursor_ms);
    }

    let produced = production.produced_between(&world, cursor_ms, now_ms).max(0);
    balance = clamp_balance(balance.saturating_add(produced), config);

    world.balance = balance;
    world.revision = revision;
    world.last_save_ms = now_ms.max(0);

    let state = StoredPlayerState {
        schema_version: config.schema_version,
        updated_at_ms: now_ms,
        world,
        request_keys: Vec::new(),
    };
    store.write_json(&paths::state_path(user_id), &state).await?;
    tracing::info!(
        user_id,
        revision = state.world.revision,
        events = events.len(),
        "Migrated legacy state to current schema"
    );

    let cleanup_store = store.clone();
    let cleanup_user = user_id.to_owned();
    tokio::spawn(async move {
        if let Err(error) = cleanup_legacy_artifacts(&cleanup_store, &cleanup_user).await {
            tracing::warn!(user_id = %cleanup_user, %error, "Legacy cleanup failed; stale artifacts remain");
        }
    });

    Ok(Some(state))
}

/// Delete every v1 artifact of a player.
pub(crate) async fn cleanup_legacy_artifacts<S: BlobStore>(
    store: &S,
    user_id: &str,
) -> Result<(), redoubt_store::StoreError> {
    store.delete_json(&paths::snapshot_path(user_id)).await?;
    store.delete_json(&paths::legacy_world_path(user_id)).await?;
    store.delete_json(&paths::legacy_wallet_path(user_id)).await?;
    store.delete_prefix(&paths::events_prefix(user_id)).await?;
    Ok(())
}
