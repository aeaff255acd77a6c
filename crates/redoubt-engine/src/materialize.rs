//! The read path: stored state plus elapsed time, without mutation.

use redoubt_types::{MaterializedState, StoredPlayerState};

use crate::config::EngineConfig;
use crate::normalize::clamp_balance;
use crate::production::ProductionModel;

/// Combine a stored state with elapsed wall-clock time into the
/// currently effective view.
///
/// Pure and idempotent: the same `stored` and `now_ms` always produce
/// the same output, the balance is non-decreasing as `now_ms` grows,
/// and the revision is untouched -- materialization is a read, never a
/// mutation. The returned world is a value clone; callers can hand it
/// out without aliasing stored state.
pub fn materialize(
    stored: &StoredPlayerState,
    now_ms: i64,
    production: &impl ProductionModel,
    config: &EngineConfig,
) -> MaterializedState {
    let produced = production
        .produced_between(&stored.world, stored.world.last_save_ms, now_ms)
        .max(0);
    let balance = clamp_balance(stored.world.balance.saturating_add(produced), config);

    let mut world = stored.world.clone();
    world.balance = balance;

    MaterializedState {
        balance,
        revision: stored.world.revision,
        last_mutation_ms: stored.world.last_save_ms,
        production_since_last_mutation: produced,
        request_keys: stored.request_keys.clone(),
        world,
    }
}
