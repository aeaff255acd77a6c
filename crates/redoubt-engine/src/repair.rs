//! Defect detection and in-place repair of degenerate worlds.
//!
//! The reconciler never refuses to serve a home world: whatever is
//! wrong with the stored state gets diagnosed, fixed from the starter
//! template, and reported as a list of reasons. Detection always runs
//! against the world as it came in, fixes accumulate on a copy, and a
//! final normalization pass makes the result canonical, so repairing a
//! repaired world is a no-op.

use std::collections::BTreeSet;

use redoubt_types::World;

use crate::config::EngineConfig;
use crate::normalize::normalize_world;
use crate::starter::{starter_buildings, starter_town_hall};

/// Why a world needed repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RepairReason {
    /// The world had no buildings at all.
    EmptyBuildings,
    /// No town hall was present.
    MissingTownhall,
    /// Buildings existed but none were playable (wall-only worlds).
    NoPlayableStructures,
    /// The balance was outside the configured range.
    InvalidBalance,
    /// Obstacles with blank or duplicate ids.
    InvalidObstacles,
    /// Revision below the floor of 1.
    InvalidRevision,
    /// Wall level below the floor of 1.
    InvalidWallLevel,
    /// A pre-epoch (negative) last-save timestamp.
    InvalidLastSave,
    /// The world id did not match its owner.
    IdMismatch,
    /// Ownership fields did not match the authenticated identity.
    OwnerMismatch,
}

impl RepairReason {
    /// Stable wire name of this reason.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyBuildings => "empty_buildings",
            Self::MissingTownhall => "missing_townhall",
            Self::NoPlayableStructures => "no_playable_structures",
            Self::InvalidBalance => "invalid_balance",
            Self::InvalidObstacles => "invalid_obstacles",
            Self::InvalidRevision => "invalid_revision",
            Self::InvalidWallLevel => "invalid_wall_level",
            Self::InvalidLastSave => "invalid_last_save",
            Self::IdMismatch => "id_mismatch",
            Self::OwnerMismatch => "owner_mismatch",
        }
    }
}

impl std::fmt::Display for RepairReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The repaired world plus every defect that was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    /// The corrected, normalized world.
    pub world: World,
    /// Defects found in the input, sorted and deduplicated. Empty
    /// means the input was already sound.
    pub reasons: Vec<RepairReason>,
}

/// Diagnose and repair a world against the playability invariants.
///
/// Detection runs on the input; fixes accumulate on a copy and finish
/// with a normalization pass. Idempotent: repairing the returned world
/// again yields the same world.
pub fn repair_world(
    world: &World,
    user_id: &str,
    username: &str,
    now_ms: i64,
    config: &EngineConfig,
) -> RepairOutcome {
    let mut reasons: BTreeSet<RepairReason> = BTreeSet::new();
    let mut fixed = world.clone();

    if world.buildings.is_empty() {
        reasons.insert(RepairReason::EmptyBuildings);
        fixed.buildings = starter_buildings();
    }

    if !world.has_town_hall() {
        reasons.insert(RepairReason::MissingTownhall);
        if !fixed.has_town_hall() {
            fixed.buildings.push(starter_town_hall());
        }
    }

    if world.playable_building_count() == 0 {
        reasons.insert(RepairReason::NoPlayableStructures);
        // Backfill whichever starter kinds are absent entirely.
        for starter in starter_buildings() {
            if !fixed.buildings.iter().any(|b| b.kind == starter.kind) {
                fixed.buildings.push(starter);
            }
        }
    }

    if world.balance < 0 || world.balance > config.max_balance.max(0) {
        reasons.insert(RepairReason::InvalidBalance);
    }

    if has_invalid_obstacles(world) {
        reasons.insert(RepairReason::InvalidObstacles);
    }

    if world.revision < 1 {
        reasons.insert(RepairReason::InvalidRevision);
    }

    if world.wall_level < 1 {
        reasons.insert(RepairReason::InvalidWallLevel);
    }

    // An epoch timestamp of 0 is the normalizer's floor and therefore
    // valid; only a negative value is a defect.
    if world.last_save_ms < 0 {
        reasons.insert(RepairReason::InvalidLastSave);
        fixed.last_save_ms = now_ms.max(0);
    }

    if world.id != user_id {
        reasons.insert(RepairReason::IdMismatch);
        fixed.id = user_id.to_owned();
    }

    if world.owner_id != user_id || world.username != username {
        reasons.insert(RepairReason::OwnerMismatch);
    }

    // Normalization applies the scalar clamps, obstacle dedup, and
    // ownership rewrite the reasons above diagnosed.
    RepairOutcome {
        world: normalize_world(&fixed, user_id, username, config),
        reasons: reasons.into_iter().collect(),
    }
}

/// Obstacle lists with blank or duplicate ids are structurally invalid.
fn has_invalid_obstacles(world: &World) -> bool {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    world
        .obstacles
        .iter()
        .any(|o| o.id.trim().is_empty() || !seen.insert(o.id.trim()))
}

#[cfg(test)]
mod tests {
    use redoubt_types::{Building, Obstacle};

    use super::*;

    fn sound_world(user_id: &str, username: &str) -> World {
        let config = EngineConfig::default();
        crate::starter::starter_world(user_id, username, 1_000, &config)
    }

    #[test]
    fn sound_world_yields_no_reasons() {
        let world = sound_world("u1", "alice");
        let outcome = repair_world(&world, "u1", "alice", 2_000, &EngineConfig::default());
        assert!(outcome.reasons.is_empty());
        assert_eq!(outcome.world, world);
    }

    #[test]
    fn empty_world_reports_emptiness_and_missing_townhall() {
        let world = World::default();
        let outcome = repair_world(&world, "u1", "alice", 2_000, &EngineConfig::default());
        assert!(outcome.reasons.contains(&RepairReason::EmptyBuildings));
        assert!(outcome.reasons.contains(&RepairReason::MissingTownhall));
        assert!(outcome.world.has_town_hall());
        assert!(outcome.world.playable_building_count() > 0);
    }

    #[test]
    fn wall_only_world_gets_playable_structures_backfilled() {
        let mut world = sound_world("u1", "alice");
        world.buildings = vec![Building {
            id: "w1".to_owned(),
            kind: "wall".to_owned(),
            x: 1,
            y: 1,
            level: 1,
        }];
        let outcome = repair_world(&world, "u1", "alice", 2_000, &EngineConfig::default());
        assert!(outcome.reasons.contains(&RepairReason::NoPlayableStructures));
        assert!(outcome.reasons.contains(&RepairReason::MissingTownhall));
        assert!(outcome.world.has_town_hall());
        // The original wall survives alongside the backfill.
        assert!(outcome.world.buildings.iter().any(|b| b.id == "w1"));
    }

    #[test]
    fn ownership_and_id_mismatches_are_corrected() {
        let mut world = sound_world("someone-else", "mallory");
        world.balance = -50;
        world.revision = 0;
        let outcome = repair_world(&world, "u1", "alice", 2_000, &EngineConfig::default());
        assert!(outcome.reasons.contains(&RepairReason::IdMismatch));
        assert!(outcome.reasons.contains(&RepairReason::OwnerMismatch));
        assert!(outcome.reasons.contains(&RepairReason::InvalidBalance));
        assert!(outcome.reasons.contains(&RepairReason::InvalidRevision));
        assert_eq!(outcome.world.id, "u1");
        assert_eq!(outcome.world.owner_id, "u1");
        assert_eq!(outcome.world.username, "alice");
        assert_eq!(outcome.world.balance, 0);
        assert_eq!(outcome.world.revision, 1);
    }

    #[test]
    fn duplicate_obstacle_ids_are_flagged_and_deduplicated() {
        let mut world = sound_world("u1", "alice");
        world.obstacles = vec![
            Obstacle {
                id: "o1".to_owned(),
                kind: "rock".to_owned(),
                x: 1,
                y: 1,
                level: 1,
            },
            Obstacle {
                id: "o1".to_owned(),
                kind: "rock".to_owned(),
                x: 2,
                y: 2,
                level: 1,
            },
            Obstacle {
                id: "  ".to_owned(),
                kind: "tree".to_owned(),
                x: 3,
                y: 3,
                level: 1,
            },
        ];
        let outcome = repair_world(&world, "u1", "alice", 2_000, &EngineConfig::default());
        assert!(outcome.reasons.contains(&RepairReason::InvalidObstacles));
        assert_eq!(outcome.world.obstacles.len(), 1);
    }

    #[test]
    fn repair_is_idempotent() {
        let world = World {
            balance: -10,
            ..World::default()
        };
        let once = repair_world(&world, "u1", "alice", 2_000, &EngineConfig::default());
        let twice = repair_world(&once.world, "u1", "alice", 2_000, &EngineConfig::default());
        assert!(twice.reasons.is_empty());
        assert_eq!(once.world, twice.world);
    }

    #[test]
    fn repair_at_epoch_zero_is_idempotent() {
        // now_ms = 0 cannot produce a positive timestamp, so the fix
        // must not re-flag the floored value on the next pass.
        let world = World {
            last_save_ms: -5,
            ..World::default()
        };
        let once = repair_world(&world, "u1", "alice", 0, &EngineConfig::default());
        assert!(once.reasons.contains(&RepairReason::InvalidLastSave));
        assert_eq!(once.world.last_save_ms, 0);

        let twice = repair_world(&once.world, "u1", "alice", 0, &EngineConfig::default());
        assert!(twice.reasons.is_empty());
        assert_eq!(once.world, twice.world);
    }

    #[test]
    fn reason_names_are_stable() {
        assert_eq!(RepairReason::EmptyBuildings.as_str(), "empty_buildings");
        assert_eq!(RepairReason::NoPlayableStructures.as_str(), "no_playable_structures");
        assert_eq!(RepairReason::InvalidLastSave.to_string(), "invalid_last_save");
    }
}
