//! Home-world resolution: retries, history recovery, and repair.
//!
//! The contract is that a player always gets a renderable, playable
//! home world. Resolution escalates through three stages:
//!
//! ```text
//!   materialize ──not renderable──▶ retry (backoff) ──still bad──▶
//!   prior-version history (best candidate, gated) ──▶ repair pass
//! ```
//!
//! Whatever the stages change is persisted through the normal mutation
//! cycle under a synthetic request key derived from the source world's
//! last-save timestamp, so two reconcilers racing over the same broken
//! state converge on a single corrective write. Persistence failure is
//! non-fatal: the player still gets the corrected world in memory.

use std::time::Duration;

use redoubt_store::BlobStore;
use redoubt_types::{MaterializedState, StoredPlayerState, World};

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::production::{ProductionModel, YieldTable};
use crate::repair::{RepairReason, repair_world};
use crate::service::PlayerStateService;

/// What resolving a home world took and produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeWorldResolution {
    /// The final, playable state handed to the caller.
    pub state: MaterializedState,

    /// Materialization attempts made (1 when the first read was good).
    pub attempts: u32,

    /// Whether the world was restored from a prior stored version.
    pub recovered: bool,

    /// Defects the repair pass found and fixed.
    pub repair_reasons: Vec<RepairReason>,

    /// Whether the corrective write (if one was needed) succeeded.
    /// `true` when nothing needed persisting.
    pub persisted: bool,
}

/// Resolves a player's home world, recovering and repairing as needed.
#[derive(Debug, Clone)]
pub struct HomeWorldReconciler<S, P = YieldTable, C = SystemClock> {
    service: PlayerStateService<S, P>,
    clock: C,
}

impl<S, P, C> HomeWorldReconciler<S, P, C>
where
    S: BlobStore + Clone + 'static,
    P: ProductionModel,
    C: Clock,
{
    /// Wrap a service with the given clock.
    pub const fn new(service: PlayerStateService<S, P>, clock: C) -> Self {
        Self { service, clock }
    }

    /// The underlying service.
    pub const fn service(&self) -> &PlayerStateService<S, P> {
        &self.service
    }

    /// Resolve the player's home world, guaranteed playable on return.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] only if the initial state cannot
    /// be loaded or created; recovery and repair failures downgrade to
    /// an unpersisted in-memory result instead.
    pub async fn resolve_home_world(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<HomeWorldResolution, EngineError> {
        let config = self.service.config();
        let max_attempts = config.materialize_attempts_clamped();

        // Stage 1: materialize, retrying with linear backoff while the
        // result is not even renderable.
        let mut attempts: u32 = 1;
        let mut view = self
            .service
            .materialize_state(user_id, username, self.clock.now_ms())
            .await?;
        while attempts < max_attempts && !is_renderable(&view.world) {
            let backoff = config.retry_backoff_ms.saturating_mul(u64::from(attempts));
            tokio::time::sleep(Duration::from_millis(backoff)).await;
            attempts = attempts.saturating_add(1);
            view = self
                .service
                .materialize_state(user_id, username, self.clock.now_ms())
                .await?;
        }

        let fully_playable = is_renderable(&view.world) && view.world.has_town_hall();

        // Stage 2: when the live state is still degenerate, look for a
        // better prior version.
        let mut world = view.world.clone();
        let mut recovered = false;
        let mut source = "live";
        if !fully_playable {
            let history = self
                .service
                .read_state_history(user_id, config.history_depth_clamped())
                .await;
            if let Some(candidate) = best_candidate(&history) {
                if should_restore(&world, &candidate.world) {
                    tracing::info!(
                        user_id,
                        candidate_revision = candidate.world.revision,
                        "Restoring world from a prior stored version"
                    );
                    world = candidate.world.clone();
                    recovered = true;
                    source = "history";
                }
            }
        }

        // Stage 3: repair whatever remains wrong. The synthetic key is
        // derived from the source world before repair touches its
        // timestamp, so re-reconciling the same broken state reuses it.
        let source_save_ms = world.last_save_ms;
        let repair = repair_world(&world, user_id, username, self.clock.now_ms(), config);

        let changed = recovered || !repair.reasons.is_empty();
        if !changed {
            return Ok(HomeWorldResolution {
                state: view,
                attempts,
                recovered,
                repair_reasons: repair.reasons,
                persisted: true,
            });
        }

        let mode = match (recovered, repair.reasons.is_empty()) {
            (true, true) => "recover",
            (true, false) => "recover+repair",
            (false, _) => "repair",
        };
        let key = format!("reconcile:{mode}:{source}:{source_save_ms}");
        tracing::warn!(
            user_id,
            mode,
            source,
            reasons = ?repair.reasons,
            "Home world required reconciliation"
        );

        let now_ms = self.clock.now_ms();
        match self
            .service
            .persist_corrected_world(user_id, username, &repair.world, Some(&key), now_ms)
            .await
        {
            Ok(outcome) => Ok(HomeWorldResolution {
                state: outcome.state,
                attempts,
                recovered,
                repair_reasons: repair.reasons,
                persisted: true,
            }),
            Err(error) => {
                tracing::warn!(
                    user_id,
                    %error,
                    "Corrective write failed; serving repaired world from memory"
                );
                let synthetic = StoredPlayerState {
                    schema_version: config.schema_version,
                    updated_at_ms: now_ms,
                    world: repair.world,
                    request_keys: Vec::new(),
                };
                Ok(HomeWorldResolution {
                    state: self.service.materialize_stored(&synthetic, now_ms),
                    attempts,
                    recovered,
                    repair_reasons: repair.reasons,
                    persisted: false,
                })
            }
        }
    }
}

/// A world worth putting on screen: at least one building, at least
/// one of them playable.
fn is_renderable(world: &World) -> bool {
    world.building_count() > 0 && world.playable_building_count() > 0
}

/// The richest prior version, by banded score: town hall presence
/// dominates, then playable count, then total count, then revision.
fn best_candidate(history: &[StoredPlayerState]) -> Option<&StoredPlayerState> {
    history
        .iter()
        .filter(|s| s.world.building_count() > 0)
        .max_by_key(|s| candidate_score(&s.world))
}

fn candidate_score(world: &World) -> u128 {
    let total = u128::try_from(world.building_count())
        .unwrap_or(0)
        .min(999_999);
    let playable = u128::try_from(world.playable_building_count())
        .unwrap_or(0)
        .min(999_999);
    let town_hall = u128::from(world.has_town_hall());
    town_hall
        .saturating_mul(1_000_000_000_000_000_000)
        .saturating_add(playable.saturating_mul(1_000_000_000_000))
        .saturating_add(total.saturating_mul(1_000_000))
        .saturating_add(u128::from(world.revision.min(999_999)))
}

/// Restoring history over live state is conservative: only when the
/// live world is empty or degenerate, or the candidate is dramatically
/// richer.
fn should_restore(current: &World, candidate: &World) -> bool {
    let cur_total = current.building_count();
    let cand_total = candidate.building_count();
    cur_total == 0
        || (current.playable_building_count() == 0 && candidate.playable_building_count() > 0)
        || (!current.has_town_hall() && candidate.has_town_hall())
        || (cand_total >= 20 && cur_total.saturating_mul(5) <= cand_total)
        || (cur_total <= 1 && cand_total >= 5)
}
