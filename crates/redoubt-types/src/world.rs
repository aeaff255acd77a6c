//! The [`World`] aggregate: one player's base and everything in it.
//!
//! A world is persisted as a single JSON blob. Every field carries a
//! serde default so that a blob with missing fields degrades to safe
//! defaults at read time instead of failing the whole read; range
//! enforcement (clamps, dedup, ownership rewrite) is the normalizer's
//! job in `redoubt-engine`, not serde's.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Building kind string identifying the town hall.
///
/// A world without a town hall is considered unplayable by the
/// reconciler and is a repair target.
pub const TOWN_HALL_KIND: &str = "town_hall";

/// Building kind string identifying wall segments.
///
/// Walls do not count toward the "playable structure" total used by
/// renderability checks and history scoring.
pub const WALL_KIND: &str = "wall";

// ---------------------------------------------------------------------------
// Troops
// ---------------------------------------------------------------------------

/// The known troop roster.
///
/// Army maps are persisted with string keys; this enum is the canonical
/// list of keys the normalizer accepts. Unknown keys are dropped on
/// every write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TroopKind {
    /// Basic melee unit.
    Barbarian,
    /// Ranged attacker.
    Archer,
    /// Slow, high-hitpoint building attacker.
    Giant,
    /// Fast resource raider.
    Goblin,
    /// Splash-damage ranged unit.
    Wizard,
    /// Support unit that restores other troops.
    Healer,
}

impl TroopKind {
    /// Every known troop kind, in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Barbarian,
        Self::Archer,
        Self::Giant,
        Self::Goblin,
        Self::Wizard,
        Self::Healer,
    ];

    /// The string key this troop is stored under in an army map.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Barbarian => "barbarian",
            Self::Archer => "archer",
            Self::Giant => "giant",
            Self::Goblin => "goblin",
            Self::Wizard => "wizard",
            Self::Healer => "healer",
        }
    }

    /// Look up a troop kind by its army-map key.
    ///
    /// Returns `None` for unknown keys, which the normalizer drops.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.key() == key)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A building placed on the base grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Unique string key within the world's building list.
    #[serde(default)]
    pub id: String,
    /// Building kind, e.g. `town_hall`, `gold_mine`, `wall`.
    #[serde(default)]
    pub kind: String,
    /// Grid column.
    #[serde(default)]
    pub x: i32,
    /// Grid row.
    #[serde(default)]
    pub y: i32,
    /// Upgrade level, at least 1 after normalization.
    #[serde(default)]
    pub level: u32,
}

/// An obstacle (rock, tree, ...) occupying grid cells.
///
/// Structurally identical to [`Building`] but kept as a distinct type:
/// obstacles never count toward playability and live in their own
/// persisted list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Unique string key within the world's obstacle list.
    #[serde(default)]
    pub id: String,
    /// Obstacle kind, e.g. `rock`, `tree`.
    #[serde(default)]
    pub kind: String,
    /// Grid column.
    #[serde(default)]
    pub x: i32,
    /// Grid row.
    #[serde(default)]
    pub y: i32,
    /// Obstacle variant level (visual tier).
    #[serde(default)]
    pub level: u32,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The full persisted state of one player's base.
///
/// Invariants (enforced by the normalizer, relied on everywhere else):
///
/// - `buildings` and `obstacles` are deduplicated by id and sorted by id
/// - `army` holds only known [`TroopKind`] keys with non-negative counts
/// - `balance` lies in `[0, max_balance]`
/// - `revision` is at least 1 and only advances on accepted mutations
/// - `last_save_ms` never decreases
/// - `owner_id` and `username` always match the authenticated caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// World identifier; canonically equal to `owner_id`.
    #[serde(default)]
    pub id: String,
    /// Identity of the owning player. Force-rewritten on every
    /// normalize pass; never trusted from input.
    #[serde(default)]
    pub owner_id: String,
    /// Display name of the owning player. Force-rewritten alongside
    /// `owner_id`.
    #[serde(default)]
    pub username: String,
    /// Buildings, deduplicated and sorted by id.
    #[serde(default)]
    pub buildings: Vec<Building>,
    /// Obstacles, deduplicated and sorted by id.
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    /// Troop counts keyed by [`TroopKind::key`] strings.
    #[serde(default)]
    pub army: BTreeMap<String, i64>,
    /// Perimeter wall level, at least 1.
    #[serde(default)]
    pub wall_level: u32,
    /// Resource balance in `[0, max_balance]`.
    #[serde(default)]
    pub balance: i64,
    /// Wall-clock time of the last accepted mutation (ms epoch).
    #[serde(default)]
    pub last_save_ms: i64,
    /// Mutation counter, incremented once per accepted mutation and
    /// never by reads. Advisory only: writers do not reject on
    /// mismatch.
    #[serde(default)]
    pub revision: u64,
}

impl World {
    /// Total number of buildings, walls included.
    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// Number of non-wall ("playable") buildings.
    pub fn playable_building_count(&self) -> usize {
        self.buildings
            .iter()
            .filter(|b| b.kind != WALL_KIND)
            .count()
    }

    /// Whether the world contains a town hall.
    pub fn has_town_hall(&self) -> bool {
        self.buildings.iter().any(|b| b.kind == TOWN_HALL_KIND)
    }
}
