//! The player state service: every read and mutation of a player's
//! persisted world goes through here.
//!
//! All mutations share one read-modify-write cycle ([`Self::mutate`]):
//! load-or-create the stored state, reject duplicate request keys, bank
//! production accrued since the last save, apply the change, normalize,
//! bump the revision, and write the whole blob back. The store offers
//! no compare-and-swap, so the cycle is not atomic; idempotency keys
//! and full-blob writes keep retries and replays convergent instead.

use redoubt_store::BlobStore;
use redoubt_types::{MaterializedState, StoredPlayerState, World, WorldPatch};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::legacy::{migrate_legacy_state, read_json_soft};
use crate::materialize::materialize;
use crate::normalize::{clamp_balance, normalize_request_key, normalize_world};
use crate::patch::{apply_patch, diff_worlds};
use crate::paths;
use crate::production::{ProductionModel, YieldTable};
use crate::starter::starter_world;

/// Result of a mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// The effective state after the attempt, materialized at the
    /// mutation's `now`.
    pub state: MaterializedState,

    /// Whether the mutation was applied and persisted. `false` means
    /// the attempt was a no-op: a duplicate request key, an empty
    /// patch, or a change that altered nothing.
    pub applied: bool,
}

/// Persistence service for player worlds.
///
/// Generic over the blob store and the production model; production
/// code uses [`YieldTable`], tests substitute fixed-rate models.
#[derive(Debug, Clone)]
pub struct PlayerStateService<S, P = YieldTable> {
    store: S,
    production: P,
    config: EngineConfig,
}

impl<S, P> PlayerStateService<S, P>
where
    S: BlobStore + Clone + 'static,
    P: ProductionModel,
{
    /// Create a service over `store` with the given production model.
    pub const fn new(store: S, production: P, config: EngineConfig) -> Self {
        Self {
            store,
            production,
            config,
        }
    }

    /// The configuration this service runs with.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ==================================================================
    // Reads
    // ==================================================================

    /// Load the player's stored state, creating it if necessary.
    ///
    /// Resolution order: the current state blob, then a one-time legacy
    /// migration, then a freshly bootstrapped starter world. A corrupt
    /// state blob is treated as absent and falls through to the later
    /// stages rather than failing the request.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if writing a migrated or
    /// bootstrapped state fails.
    pub async fn ensure_state(
        &self,
        user_id: &str,
        username: &str,
        now_ms: i64,
    ) -> Result<StoredPlayerState, EngineError> {
        let path = paths::state_path(user_id);
        if let Some(stored) = read_json_soft::<S, StoredPlayerState>(&self.store, &path).await {
            return Ok(stored);
        }

        if let Some(migrated) = migrate_legacy_state(
            &self.store,
            &self.production,
            &self.config,
            user_id,
            username,
            now_ms,
        )
        .await?
        {
            return Ok(migrated);
        }

        let state = StoredPlayerState {
            schema_version: self.config.schema_version,
            updated_at_ms: now_ms,
            world: starter_world(user_id, username, now_ms, &self.config),
            request_keys: Vec::new(),
        };
        self.store.write_json(&path, &state).await?;
        tracing::info!(user_id, "Bootstrapped starter world for new player");
        Ok(state)
    }

    /// The player's currently effective state: stored state plus
    /// production accrued up to `now_ms`. Read-only; nothing is
    /// persisted beyond what [`Self::ensure_state`] creates.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if state creation fails.
    pub async fn materialize_state(
        &self,
        user_id: &str,
        username: &str,
        now_ms: i64,
    ) -> Result<MaterializedState, EngineError> {
        let stored = self.ensure_state(user_id, username, now_ms).await?;
        Ok(self.materialize_stored(&stored, now_ms))
    }

    /// Materialize an already loaded stored state at `now_ms`.
    pub fn materialize_stored(
        &self,
        stored: &StoredPlayerState,
        now_ms: i64,
    ) -> MaterializedState {
        materialize(stored, now_ms, &self.production, &self.config)
    }

    /// Number of buildings in the player's stored world. Zero when the
    /// player has no state; never creates one.
    pub async fn count_player_buildings(&self, user_id: &str) -> usize {
        let path = paths::state_path(user_id);
        read_json_soft::<S, StoredPlayerState>(&self.store, &path)
            .await
            .map_or(0, |stored| stored.world.building_count())
    }

    /// Prior versions of the player's state blob, newest first. Empty
    /// on any store failure; history is an opportunistic input, never a
    /// hard dependency.
    pub async fn read_state_history(
        &self,
        user_id: &str,
        depth: usize,
    ) -> Vec<StoredPlayerState> {
        let path = paths::state_path(user_id);
        match self.store.read_json_history(&path, depth).await {
            Ok(versions) => versions,
            Err(error) => {
                tracing::warn!(user_id, %error, "History read failed; proceeding without history");
                Vec::new()
            }
        }
    }

    /// Compute the structural patch that would bring `current` to the
    /// client-pushed `incoming`, after normalizing both sides.
    pub fn build_patch_from_client_state(
        &self,
        current: &World,
        incoming: &World,
        user_id: &str,
        username: &str,
    ) -> WorldPatch {
        let current = normalize_world(current, user_id, username, &self.config);
        let incoming = normalize_world(incoming, user_id, username, &self.config);
        diff_worlds(&current, &incoming)
    }

    // ==================================================================
    // Mutations
    // ==================================================================

    /// Persist a full-snapshot client save.
    ///
    /// Only the structural diff of the incoming world is applied:
    /// buildings, obstacles, army, and wall level. The balance the
    /// client claims is ignored; the server-side balance (with banked
    /// production) is authoritative. A save that changes nothing is a
    /// no-op with zero writes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if persisting the new state fails.
    pub async fn save_world(
        &self,
        user_id: &str,
        username: &str,
        incoming: &World,
        request_key: Option<&str>,
        now_ms: i64,
    ) -> Result<MutationOutcome, EngineError> {
        let incoming = normalize_world(incoming, user_id, username, &self.config);
        self.mutate(user_id, username, request_key, now_ms, |base| {
            let patch = diff_worlds(base, &incoming);
            if patch.is_empty() {
                return None;
            }
            Some(apply_patch(base, &patch))
        })
        .await
    }

    /// Apply a pre-computed structural patch. An empty patch is a no-op
    /// with zero writes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if persisting the new state fails.
    pub async fn append_world_patch(
        &self,
        user_id: &str,
        username: &str,
        patch: &WorldPatch,
        request_key: Option<&str>,
        now_ms: i64,
    ) -> Result<MutationOutcome, EngineError> {
        self.mutate(user_id, username, request_key, now_ms, |base| {
            if patch.is_empty() {
                return None;
            }
            Some(apply_patch(base, patch))
        })
        .await
    }

    /// Adjust the player's balance by `amount` (clamped into range).
    ///
    /// A zero delta is always a no-op with zero writes, whether or not
    /// a request key accompanies it. The same holds when the clamp
    /// cancels the delta entirely, e.g. spending at a balance of zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if persisting the new state fails.
    pub async fn append_resource_delta(
        &self,
        user_id: &str,
        username: &str,
        amount: i64,
        request_key: Option<&str>,
        now_ms: i64,
    ) -> Result<MutationOutcome, EngineError> {
        if amount == 0 {
            let state = self.materialize_state(user_id, username, now_ms).await?;
            return Ok(MutationOutcome {
                state,
                applied: false,
            });
        }
        self.mutate(user_id, username, request_key, now_ms, |base| {
            let balance = clamp_balance(base.balance.saturating_add(amount), &self.config);
            if balance == base.balance {
                return None;
            }
            let mut next = base.clone();
            next.balance = balance;
            Some(next)
        })
        .await
    }

    /// Overwrite the player's world with an already corrected one,
    /// going through the normal mutation cycle (revision bump, request
    /// key dedup, full-blob write). The corrected world's balance is
    /// taken as-is rather than the banked server balance.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if persisting the new state fails.
    pub(crate) async fn persist_corrected_world(
        &self,
        user_id: &str,
        username: &str,
        corrected: &World,
        request_key: Option<&str>,
        now_ms: i64,
    ) -> Result<MutationOutcome, EngineError> {
        self.mutate(user_id, username, request_key, now_ms, |_base| {
            Some(corrected.clone())
        })
        .await
    }

    /// Delete the player's state blob and any legacy remnants.
    ///
    /// The state deletion is load-bearing and propagates its error;
    /// legacy remnant cleanup is best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if deleting the state blob fails.
    pub async fn delete_player_state(&self, user_id: &str) -> Result<(), EngineError> {
        self.store.delete_json(&paths::state_path(user_id)).await?;
        if let Err(error) = crate::legacy::cleanup_legacy_artifacts(&self.store, user_id).await {
            tracing::warn!(user_id, %error, "Legacy cleanup during delete failed");
        }
        tracing::info!(user_id, "Deleted player state");
        Ok(())
    }

    // ==================================================================
    // The mutation cycle
    // ==================================================================

    /// The shared read-modify-write cycle.
    ///
    /// `change` receives the stored world with production already
    /// banked into its balance, and returns the replacement world, or
    /// `None` to signal a no-op. On a no-op or a duplicate request key
    /// nothing is written and `applied` is `false`.
    async fn mutate<F>(
        &self,
        user_id: &str,
        username: &str,
        request_key: Option<&str>,
        now_ms: i64,
        change: F,
    ) -> Result<MutationOutcome, EngineError>
    where
        F: FnOnce(&World) -> Option<World>,
    {
        let stored = self.ensure_state(user_id, username, now_ms).await?;

        let key = request_key.and_then(|k| normalize_request_key(k, &self.config));
        if let Some(key) = &key {
            if stored.request_keys.contains(key) {
                tracing::debug!(user_id, key, "Duplicate request key; returning current state");
                return Ok(MutationOutcome {
                    state: self.materialize_stored(&stored, now_ms),
                    applied: false,
                });
            }
        }

        let banked = self
            .production
            .produced_between(&stored.world, stored.world.last_save_ms, now_ms)
            .max(0);
        let mut base = stored.world.clone();
        base.balance = clamp_balance(base.balance.saturating_add(banked), &self.config);

        let Some(next) = change(&base) else {
            return Ok(MutationOutcome {
                state: self.materialize_stored(&stored, now_ms),
                applied: false,
            });
        };

        let mut world = normalize_world(&next, user_id, username, &self.config);
        world.revision = stored.world.revision.saturating_add(1);
        world.last_save_ms = now_ms.max(stored.world.last_save_ms);

        let mut request_keys = stored.request_keys;
        if let Some(key) = key {
            request_keys.push(key);
        }
        let overflow = request_keys.len().saturating_sub(self.config.max_request_keys);
        if overflow > 0 {
            request_keys.drain(..overflow);
        }

        let state = StoredPlayerState {
            schema_version: self.config.schema_version,
            updated_at_ms: now_ms,
            world,
            request_keys,
        };
        self.store
            .write_json(&paths::state_path(user_id), &state)
            .await?;
        tracing::debug!(
            user_id,
            revision = state.world.revision,
            "Applied and persisted mutation"
        );

        Ok(MutationOutcome {
            state: self.materialize_stored(&state, now_ms),
            applied: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use redoubt_store::MemoryStore;
    use redoubt_types::Building;

    use super::*;

    const HOUR_MS: i64 = 3_600_000;

    fn service(store: &MemoryStore) -> PlayerStateService<MemoryStore> {
        PlayerStateService::new(store.clone(), YieldTable::default(), EngineConfig::default())
    }

    #[tokio::test]
    async fn new_player_bootstraps_a_starter_world_once() {
        let store = MemoryStore::new();
        let svc = service(&store);

        let first = svc.ensure_state("u1", "alice", 1_000).await;
        assert!(first.is_ok());
        if let Ok(state) = &first {
            assert!(state.world.has_town_hall());
            assert_eq!(state.world.revision, 1);
            assert_eq!(state.world.balance, EngineConfig::default().starting_balance);
        }
        assert_eq!(store.write_count(), 1);

        // Second call reads the existing blob.
        let second = svc.ensure_state("u1", "alice", 2_000).await;
        assert!(second.is_ok());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_request_key_is_a_read() {
        let store = MemoryStore::new();
        let svc = service(&store);

        let first = svc
            .append_resource_delta("u1", "alice", 100, Some("r1"), 1_000)
            .await;
        assert!(first.is_ok());
        let writes_after_first = store.write_count();

        let replay = svc
            .append_resource_delta("u1", "alice", 100, Some("r1"), 2_000)
            .await;
        assert!(replay.is_ok());
        if let (Ok(a), Ok(b)) = (first, replay) {
            assert!(a.applied);
            assert!(!b.applied);
            assert_eq!(a.state.revision, b.state.revision);
            assert_eq!(a.state.world.balance, b.state.world.balance);
        }
        assert_eq!(store.write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn zero_delta_is_a_noop_with_zero_writes() {
        let store = MemoryStore::new();
        let svc = service(&store);
        assert!(svc.ensure_state("u1", "alice", 0).await.is_ok());
        let writes = store.write_count();

        let outcome = svc
            .append_resource_delta("u1", "alice", 0, Some("r-zero"), 1_000)
            .await;
        assert!(outcome.is_ok());
        assert!(outcome.is_ok_and(|o| !o.applied));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn clamped_away_delta_is_a_noop_with_zero_writes() {
        let store = MemoryStore::new();
        let svc = service(&store);

        // Drain the starting balance to zero.
        let drained = svc
            .append_resource_delta("u1", "alice", -5_000, Some("r1"), 1_000)
            .await;
        assert!(drained.is_ok_and(|o| o.applied && o.state.world.balance == 0));
        let writes = store.write_count();

        // Spending at zero clamps to zero: nothing changes, nothing is
        // written, and the key is not consumed.
        let spent = svc
            .append_resource_delta("u1", "alice", -500, Some("r2"), 1_000)
            .await;
        assert!(spent.is_ok());
        if let Ok(outcome) = spent {
            assert!(!outcome.applied);
            assert_eq!(outcome.state.world.balance, 0);
        }
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn save_ignores_client_balance_and_keeps_banked_server_balance() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let bootstrapped = svc.ensure_state("u1", "alice", 0).await;
        assert!(bootstrapped.is_ok());

        let Ok(stored) = bootstrapped else { return };
        let mut incoming = stored.world.clone();
        incoming.balance = 999_999_999;
        incoming.wall_level = 3;

        // One hour elapsed: starter mine and collector bank 100.
        let saved = svc
            .save_world("u1", "alice", &incoming, Some("r1"), HOUR_MS)
            .await;
        assert!(saved.is_ok());
        if let Ok(outcome) = saved {
            assert!(outcome.applied);
            assert_eq!(outcome.state.world.wall_level, 3);
            let expected = EngineConfig::default().starting_balance.saturating_add(100);
            assert_eq!(outcome.state.world.balance, expected);
        }
    }

    #[tokio::test]
    async fn identical_save_is_a_noop() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let bootstrapped = svc.ensure_state("u1", "alice", 0).await;
        assert!(bootstrapped.is_ok());
        let writes = store.write_count();

        let Ok(stored) = bootstrapped else { return };
        let saved = svc
            .save_world("u1", "alice", &stored.world, None, 0)
            .await;
        assert!(saved.is_ok_and(|o| !o.applied));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn revision_increases_by_one_per_applied_mutation() {
        let store = MemoryStore::new();
        let svc = service(&store);

        let mut revision = 0;
        for (i, amount) in [10, 20, 30].iter().enumerate() {
            let key = format!("r{i}");
            let outcome = svc
                .append_resource_delta("u1", "alice", *amount, Some(&key), 1_000)
                .await;
            assert!(outcome.is_ok());
            if let Ok(o) = outcome {
                assert!(o.state.revision > revision);
                revision = o.state.revision;
            }
        }
        // Bootstrap at revision 1 plus three applied deltas.
        assert_eq!(revision, 4);
    }

    #[tokio::test]
    async fn request_key_window_evicts_oldest_keys() {
        let store = MemoryStore::new();
        let config = EngineConfig {
            max_request_keys: 2,
            ..EngineConfig::default()
        };
        let svc = PlayerStateService::new(store.clone(), YieldTable::default(), config);

        for key in ["r1", "r2", "r3"] {
            let outcome = svc
                .append_resource_delta("u1", "alice", 5, Some(key), 1_000)
                .await;
            assert!(outcome.is_ok_and(|o| o.applied));
        }

        // r1 fell out of the window, so replaying it applies again.
        let replayed = svc
            .append_resource_delta("u1", "alice", 5, Some("r1"), 1_000)
            .await;
        assert!(replayed.is_ok_and(|o| o.applied));
    }

    #[tokio::test]
    async fn append_world_patch_adds_and_removes_entities() {
        let store = MemoryStore::new();
        let svc = service(&store);
        assert!(svc.ensure_state("u1", "alice", 0).await.is_ok());

        let patch = WorldPatch {
            upsert_buildings: vec![Building {
                id: "new-cannon".to_owned(),
                kind: "cannon".to_owned(),
                x: 8,
                y: 8,
                level: 1,
            }],
            remove_building_ids: vec!["starter-builder_hut".to_owned()],
            ..WorldPatch::default()
        };
        let outcome = svc
            .append_world_patch("u1", "alice", &patch, Some("r1"), 1_000)
            .await;
        assert!(outcome.is_ok());
        if let Ok(o) = outcome {
            assert!(o.applied);
            let ids: Vec<&str> = o.state.world.buildings.iter().map(|b| b.id.as_str()).collect();
            assert!(ids.contains(&"new-cannon"));
            assert!(!ids.contains(&"starter-builder_hut"));
        }
    }

    #[tokio::test]
    async fn delete_player_state_removes_the_blob() {
        let store = MemoryStore::new();
        let svc = service(&store);
        assert!(svc.ensure_state("u1", "alice", 0).await.is_ok());
        assert!(store.contains("game/u1/state.json"));

        assert!(svc.delete_player_state("u1").await.is_ok());
        assert!(!store.contains("game/u1/state.json"));
        assert_eq!(svc.count_player_buildings("u1").await, 0);
    }

    #[tokio::test]
    async fn corrupt_state_blob_falls_through_to_bootstrap() {
        let store = MemoryStore::new();
        let written = store
            .write_json("game/u1/state.json", &serde_json::json!("not a state"))
            .await;
        assert!(written.is_ok());

        let svc = service(&store);
        let state = svc.ensure_state("u1", "alice", 1_000).await;
        assert!(state.is_ok_and(|s| s.world.has_town_hall()));
    }
}
