//! Minimal structural deltas between two worlds.
//!
//! A [`WorldPatch`] captures the difference between a current and an
//! incoming world as id-keyed upserts and removals, plus optional army
//! and wall-level overrides. It is what the patch engine in
//! `redoubt-engine` produces and consumes; it is also the payload shape
//! of legacy `world_patch` events replayed during migration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::world::{Building, Obstacle};

/// A minimal structural delta between two world snapshots.
///
/// Entity lists are sorted lexicographically by id so that a patch
/// built from the same pair of worlds is byte-identical every time.
/// Unmentioned entities are left untouched by apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldPatch {
    /// Buildings to insert or replace, sorted by id.
    #[serde(default)]
    pub upsert_buildings: Vec<Building>,
    /// Building ids to delete, sorted.
    #[serde(default)]
    pub remove_building_ids: Vec<String>,
    /// Obstacles to insert or replace, sorted by id.
    #[serde(default)]
    pub upsert_obstacles: Vec<Obstacle>,
    /// Obstacle ids to delete, sorted.
    #[serde(default)]
    pub remove_obstacle_ids: Vec<String>,
    /// Full army override, present only when the army changed.
    #[serde(default)]
    pub army: Option<BTreeMap<String, i64>>,
    /// Wall level override, present only when the wall level changed.
    #[serde(default)]
    pub wall_level: Option<u32>,
}

impl WorldPatch {
    /// Whether applying this patch would leave any world unchanged.
    pub fn is_empty(&self) -> bool {
        self.upsert_buildings.is_empty()
            && self.remove_building_ids.is_empty()
            && self.upsert_obstacles.is_empty()
            && self.remove_obstacle_ids.is_empty()
            && self.army.is_none()
            && self.wall_level.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patch_is_empty() {
        assert!(WorldPatch::default().is_empty());
    }

    #[test]
    fn wall_level_override_makes_patch_non_empty() {
        let patch = WorldPatch {
            wall_level: Some(3),
            ..WorldPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
