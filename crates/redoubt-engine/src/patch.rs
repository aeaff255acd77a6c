//! Structural diff/apply between two world snapshots.
//!
//! `diff` turns a full-snapshot client push into a minimal delta;
//! `apply` replays a delta onto a world. Both sides key entities by id,
//! so the round trip `apply(world, diff(world, incoming))` reproduces
//! `incoming`'s buildings, obstacles, army, and wall level exactly.

use std::collections::{BTreeMap, BTreeSet};

use redoubt_types::{Building, Obstacle, World, WorldPatch};

/// Compute the minimal structural delta from `current` to `incoming`.
///
/// An entity lands in the upsert set if it is new or differs from the
/// current entity with the same id on any field; an id present in
/// `current` but absent from `incoming` lands in the removal set. Both
/// sets come out sorted by id. Army and wall level are included only
/// when changed. Callers are expected to hand in normalized worlds;
/// diffing unsanitized input produces patches that re-apply whatever
/// junk the normalizer would have stripped.
pub fn diff_worlds(current: &World, incoming: &World) -> WorldPatch {
    let (upsert_buildings, remove_building_ids) =
        diff_entities(&current.buildings, &incoming.buildings, |b: &Building| {
            b.id.as_str()
        });
    let (upsert_obstacles, remove_obstacle_ids) =
        diff_entities(&current.obstacles, &incoming.obstacles, |o: &Obstacle| {
            o.id.as_str()
        });

    WorldPatch {
        upsert_buildings,
        remove_building_ids,
        upsert_obstacles,
        remove_obstacle_ids,
        army: (current.army != incoming.army).then(|| incoming.army.clone()),
        wall_level: (current.wall_level != incoming.wall_level).then_some(incoming.wall_level),
    }
}

/// Apply a patch to a world, returning the patched copy.
///
/// Upserts replace-or-insert by id, removals delete by id, and
/// unmentioned entities are untouched. The resulting collections are
/// deduplicated through an id-keyed map and re-sorted by id before
/// being considered canonical. Balance, revision, and timestamps are
/// untouched; they belong to the mutation cycle, not the patch.
pub fn apply_patch(world: &World, patch: &WorldPatch) -> World {
    let mut patched = world.clone();
    patched.buildings = apply_entities(
        &world.buildings,
        &patch.upsert_buildings,
        &patch.remove_building_ids,
        |b: &Building| b.id.as_str(),
    );
    patched.obstacles = apply_entities(
        &world.obstacles,
        &patch.upsert_obstacles,
        &patch.remove_obstacle_ids,
        |o: &Obstacle| o.id.as_str(),
    );
    if let Some(army) = &patch.army {
        patched.army = army.clone();
    }
    if let Some(wall_level) = patch.wall_level {
        patched.wall_level = wall_level;
    }
    patched
}

/// Diff one id-keyed entity list: (upserts sorted by id, removed ids
/// sorted).
fn diff_entities<T, F>(current: &[T], incoming: &[T], id_of: F) -> (Vec<T>, Vec<String>)
where
    T: Clone + PartialEq,
    F: Fn(&T) -> &str,
{
    let current_by_id: BTreeMap<&str, &T> =
        current.iter().map(|e| (id_of(e), e)).collect();
    let incoming_ids: BTreeSet<&str> = incoming.iter().map(|e| id_of(e)).collect();

    let upserts: BTreeMap<String, T> = incoming
        .iter()
        .filter(|e| current_by_id.get(id_of(e)).copied() != Some(*e))
        .map(|e| (id_of(e).to_owned(), e.clone()))
        .collect();

    let removals: Vec<String> = current_by_id
        .keys()
        .filter(|id| !incoming_ids.contains(*id))
        .map(|id| (*id).to_owned())
        .collect();

    (upserts.into_values().collect(), removals)
}

/// Apply upserts and removals to one id-keyed entity list.
fn apply_entities<T, F>(current: &[T], upserts: &[T], removals: &[String], id_of: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    let mut by_id: BTreeMap<String, T> = current
        .iter()
        .map(|e| (id_of(e).to_owned(), e.clone()))
        .collect();
    for entity in upserts {
        by_id.insert(id_of(entity).to_owned(), entity.clone());
    }
    for id in removals {
        by_id.remove(id);
    }
    by_id.into_values().collect()
}
