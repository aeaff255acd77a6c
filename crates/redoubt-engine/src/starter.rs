//! The starter base template.
//!
//! Every brand-new player starts from this deterministic layout, and
//! the repair pass backfills from it when a stored world has lost its
//! essential structures. Entity ids are stable strings so repeated
//! bootstraps and backfills converge instead of multiplying entities.

use redoubt_types::{Building, Obstacle, TOWN_HALL_KIND, World};

use crate::config::EngineConfig;

/// Non-wall building kinds present in the starter layout, with their
/// grid placement. The repair pass backfills any of these kinds that a
/// degenerate world is missing entirely.
pub const STARTER_LAYOUT: [(&str, i32, i32); 7] = [
    (TOWN_HALL_KIND, 20, 20),
    ("gold_mine", 14, 18),
    ("elixir_collector", 26, 18),
    ("gold_storage", 14, 24),
    ("elixir_storage", 26, 24),
    ("cannon", 20, 14),
    ("builder_hut", 28, 28),
];

/// Build the level-1 starter entity for one layout slot.
fn starter_building(kind: &str, x: i32, y: i32) -> Building {
    Building {
        id: format!("starter-{kind}"),
        kind: kind.to_owned(),
        x,
        y,
        level: 1,
    }
}

/// The full starter building set, sorted by id.
pub fn starter_buildings() -> Vec<Building> {
    let mut buildings: Vec<Building> = STARTER_LAYOUT
        .iter()
        .map(|&(kind, x, y)| starter_building(kind, x, y))
        .collect();
    buildings.sort_by(|a, b| a.id.cmp(&b.id));
    buildings
}

/// The starter town hall on its own, for targeted repair insertion.
pub fn starter_town_hall() -> Building {
    starter_building(TOWN_HALL_KIND, 20, 20)
}

/// Synthesize a complete starter world for a new player.
///
/// Revision starts at 1, the balance at the configured starting
/// balance, and `last_save_ms` at `now_ms` so no production accrues
/// before the first real mutation.
pub fn starter_world(
    owner_id: &str,
    username: &str,
    now_ms: i64,
    config: &EngineConfig,
) -> World {
    World {
        id: owner_id.to_owned(),
        owner_id: owner_id.to_owned(),
        username: username.to_owned(),
        buildings: starter_buildings(),
        obstacles: vec![
            Obstacle {
                id: "starter-rock".to_owned(),
                kind: "rock".to_owned(),
                x: 6,
                y: 30,
                level: 1,
            },
            Obstacle {
                id: "starter-tree".to_owned(),
                kind: "tree".to_owned(),
                x: 34,
                y: 8,
                level: 1,
            },
        ],
        army: std::collections::BTreeMap::new(),
        wall_level: 1,
        balance: config.starting_balance.clamp(0, config.max_balance.max(0)),
        last_save_ms: now_ms.max(0),
        revision: 1,
    }
}
