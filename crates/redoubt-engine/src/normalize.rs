//! Pure validation and coercion of worlds into invariant-satisfying
//! form.
//!
//! Everything here is total: malformed input degrades to defaults
//! instead of erroring, because the save path has no recovery story to
//! offer a caller whose request was already accepted. Ownership fields
//! are force-rewritten to the authenticated caller's identity on every
//! pass -- a stored blob never gets to claim who owns it.

use std::collections::BTreeMap;

use redoubt_types::{Building, Obstacle, TroopKind, World};

use crate::config::EngineConfig;

/// Maximum stored length of an entity or world id.
const MAX_ID_LEN: usize = 64;

/// Maximum stored length of a kind string.
const MAX_KIND_LEN: usize = 48;

/// Grid coordinates are clamped to `[0, MAX_GRID_COORD]`.
const MAX_GRID_COORD: i32 = 512;

/// Upgrade levels are clamped to `[1, MAX_LEVEL]`.
const MAX_LEVEL: u32 = 100;

/// Troop counts are clamped to `[0, MAX_TROOP_COUNT]`.
const MAX_TROOP_COUNT: i64 = 1_000_000;

/// Clamp a balance into the configured range.
pub fn clamp_balance(value: i64, config: &EngineConfig) -> i64 {
    value.clamp(0, config.max_balance.max(0))
}

/// Normalize a raw world into invariant-satisfying form.
///
/// Pure and total: never fails, never panics. Clamps the balance,
/// floors revision to 1 and last-save to 0, deduplicates and id-sorts
/// entities, drops unknown army keys, and forces `owner_id` and
/// `username` to the supplied identity regardless of what the input
/// claims.
pub fn normalize_world(
    raw: &World,
    owner_id: &str,
    username: &str,
    config: &EngineConfig,
) -> World {
    let id = sanitize_id(&raw.id).unwrap_or_else(|| owner_id.to_owned());

    let buildings: BTreeMap<String, Building> = raw
        .buildings
        .iter()
        .filter_map(sanitize_building)
        .map(|b| (b.id.clone(), b))
        .collect();
    let obstacles: BTreeMap<String, Obstacle> = raw
        .obstacles
        .iter()
        .filter_map(sanitize_obstacle)
        .map(|o| (o.id.clone(), o))
        .collect();

    World {
        id,
        owner_id: owner_id.to_owned(),
        username: username.to_owned(),
        buildings: buildings.into_values().collect(),
        obstacles: obstacles.into_values().collect(),
        army: sanitize_army(&raw.army),
        wall_level: raw.wall_level.clamp(1, MAX_LEVEL),
        balance: clamp_balance(raw.balance, config),
        last_save_ms: raw.last_save_ms.max(0),
        revision: raw.revision.max(1),
    }
}

/// Sanitize a building; `None` if its id is unusable.
pub fn sanitize_building(building: &Building) -> Option<Building> {
    let id = sanitize_id(&building.id)?;
    Some(Building {
        id,
        kind: sanitize_kind(&building.kind),
        x: building.x.clamp(0, MAX_GRID_COORD),
        y: building.y.clamp(0, MAX_GRID_COORD),
        level: building.level.clamp(1, MAX_LEVEL),
    })
}

/// Sanitize an obstacle; `None` if its id is unusable.
pub fn sanitize_obstacle(obstacle: &Obstacle) -> Option<Obstacle> {
    let id = sanitize_id(&obstacle.id)?;
    Some(Obstacle {
        id,
        kind: sanitize_kind(&obstacle.kind),
        x: obstacle.x.clamp(0, MAX_GRID_COORD),
        y: obstacle.y.clamp(0, MAX_GRID_COORD),
        level: obstacle.level.clamp(1, MAX_LEVEL),
    })
}

/// Keep only known troop keys with counts clamped to a sane range.
fn sanitize_army(army: &BTreeMap<String, i64>) -> BTreeMap<String, i64> {
    army.iter()
        .filter(|(key, _)| TroopKind::from_key(key).is_some())
        .map(|(key, count)| (key.clone(), (*count).clamp(0, MAX_TROOP_COUNT)))
        .collect()
}

/// Trim and length-cap an id; `None` when nothing usable remains.
fn sanitize_id(id: &str) -> Option<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_chars(trimmed, MAX_ID_LEN))
}

/// Trim and length-cap a kind string; blank kinds become `unknown`.
fn sanitize_kind(kind: &str) -> String {
    let trimmed = kind.trim();
    if trimmed.is_empty() {
        return "unknown".to_owned();
    }
    truncate_chars(trimmed, MAX_KIND_LEN)
}

/// Normalize a client-supplied request key: trim, length-cap, and
/// reject keys that are blank after trimming.
pub fn normalize_request_key(key: &str, config: &EngineConfig) -> Option<String> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_chars(trimmed, config.request_key_max_len))
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_world() -> World {
        World {
            id: "  w1  ".to_owned(),
            owner_id: "attacker".to_owned(),
            username: "Mallory".to_owned(),
            buildings: vec![
                Building {
                    id: "b2".to_owned(),
                    kind: "cannon".to_owned(),
                    x: -5,
                    y: 9_999,
                    level: 0,
                },
                Building {
                    id: "b1".to_owned(),
                    kind: "town_hall".to_owned(),
                    x: 20,
                    y: 20,
                    level: 3,
                },
                Building {
                    id: "b1".to_owned(),
                    kind: "town_hall".to_owned(),
                    x: 21,
                    y: 21,
                    level: 4,
                },
                Building {
                    id: "   ".to_owned(),
                    kind: "cannon".to_owned(),
                    x: 1,
                    y: 1,
                    level: 1,
                },
            ],
            obstacles: vec![],
            army: [
                ("barbarian".to_owned(), -3),
                ("dragon".to_owned(), 10),
                ("archer".to_owned(), 12),
            ]
            .into_iter()
            .collect(),
            wall_level: 0,
            balance: -500,
            last_save_ms: -1,
            revision: 0,
        }
    }

    #[test]
    fn ownership_is_forced_to_caller_identity() {
        let world = normalize_world(&raw_world(), "u1", "alice", &EngineConfig::default());
        assert_eq!(world.owner_id, "u1");
        assert_eq!(world.username, "alice");
    }

    #[test]
    fn entities_are_deduplicated_and_sorted_by_id() {
        let world = normalize_world(&raw_world(), "u1", "alice", &EngineConfig::default());
        let ids: Vec<&str> = world.buildings.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
        // Later duplicate wins.
        let b1 = world.buildings.iter().find(|b| b.id == "b1");
        assert_eq!(b1.map(|b| b.level), Some(4));
    }

    #[test]
    fn scalar_fields_are_floored_and_clamped() {
        let world = normalize_world(&raw_world(), "u1", "alice", &EngineConfig::default());
        assert_eq!(world.balance, 0);
        assert_eq!(world.last_save_ms, 0);
        assert_eq!(world.revision, 1);
        assert_eq!(world.wall_level, 1);
        let b2 = world.buildings.iter().find(|b| b.id == "b2");
        assert_eq!(b2.map(|b| (b.x, b.y, b.level)), Some((0, MAX_GRID_COORD, 1)));
    }

    #[test]
    fn unknown_army_keys_are_dropped_and_counts_floored() {
        let world = normalize_world(&raw_world(), "u1", "alice", &EngineConfig::default());
        assert_eq!(world.army.get("barbarian"), Some(&0));
        assert_eq!(world.army.get("archer"), Some(&12));
        assert_eq!(world.army.get("dragon"), None);
    }

    #[test]
    fn balance_clamps_to_configured_maximum() {
        let config = EngineConfig {
            max_balance: 100,
            ..EngineConfig::default()
        };
        assert_eq!(clamp_balance(5_000, &config), 100);
        assert_eq!(clamp_balance(-1, &config), 0);
        assert_eq!(clamp_balance(40, &config), 40);
    }

    #[test]
    fn request_keys_are_trimmed_capped_and_blank_rejected() {
        let config = EngineConfig::default();
        assert_eq!(normalize_request_key("  r1  ", &config).as_deref(), Some("r1"));
        assert_eq!(normalize_request_key("   ", &config), None);
        let long = "x".repeat(500);
        let capped = normalize_request_key(&long, &config);
        assert_eq!(capped.map(|k| k.chars().count()), Some(160));
    }

    #[test]
    fn normalization_is_idempotent() {
        let config = EngineConfig::default();
        let once = normalize_world(&raw_world(), "u1", "alice", &config);
        let twice = normalize_world(&once, "u1", "alice", &config);
        assert_eq!(once, twice);
    }
}
