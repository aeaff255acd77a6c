//! Resource production integrated over wall-clock time.
//!
//! The engine never ticks: production exists only as an integral
//! between two timestamps, computed at read or mutation time from the
//! building configuration it is handed. A building upgraded halfway
//! through an interval therefore earns its new rate for the whole
//! remainder of the interval it is queried over -- an accepted
//! approximation.

use std::collections::BTreeMap;

use redoubt_types::World;

/// Milliseconds per hour, the unit production rates are quoted in.
const MS_PER_HOUR: i128 = 3_600_000;

/// Computes resource yield accrued between two timestamps.
///
/// Implementations must be pure, return a non-negative yield, be
/// monotonic in elapsed time, and depend only on the building
/// configuration passed in.
pub trait ProductionModel: Send + Sync {
    /// Yield produced by `world`'s buildings over `[from_ms, to_ms]`.
    /// Inverted or equal bounds yield zero.
    fn produced_between(&self, world: &World, from_ms: i64, to_ms: i64) -> i64;
}

/// The default production model: a table of hourly rates per building
/// kind, scaled linearly by building level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldTable {
    rates_per_hour: BTreeMap<String, i64>,
}

impl YieldTable {
    /// Build a table from explicit per-kind hourly rates.
    pub const fn new(rates_per_hour: BTreeMap<String, i64>) -> Self {
        Self { rates_per_hour }
    }

    /// Combined hourly rate of every producer in `world`, level-scaled.
    fn hourly_rate(&self, world: &World) -> i64 {
        world.buildings.iter().fold(0_i64, |total, building| {
            let rate = self
                .rates_per_hour
                .get(&building.kind)
                .copied()
                .unwrap_or(0)
                .max(0);
            total.saturating_add(rate.saturating_mul(i64::from(building.level)))
        })
    }
}

impl Default for YieldTable {
    /// Production rates of the standard resource buildings.
    fn default() -> Self {
        Self::new(BTreeMap::from([
            ("gold_mine".to_owned(), 50),
            ("elixir_collector".to_owned(), 50),
        ]))
    }
}

impl ProductionModel for YieldTable {
    fn produced_between(&self, world: &World, from_ms: i64, to_ms: i64) -> i64 {
        let elapsed = i128::from(to_ms.saturating_sub(from_ms).max(0));
        let rate = i128::from(self.hourly_rate(world));
        let produced = rate
            .saturating_mul(elapsed)
            .checked_div(MS_PER_HOUR)
            .unwrap_or(0);
        i64::try_from(produced).unwrap_or(i64::MAX).max(0)
    }
}

#[cfg(test)]
mod tests {
    use redoubt_types::Building;

    use super::*;

    fn world_with_mine(level: u32) -> World {
        World {
            buildings: vec![Building {
                id: "m1".to_owned(),
                kind: "gold_mine".to_owned(),
                x: 0,
                y: 0,
                level,
            }],
            ..World::default()
        }
    }

    #[test]
    fn zero_elapsed_yields_zero() {
        let table = YieldTable::default();
        assert_eq!(table.produced_between(&world_with_mine(1), 500, 500), 0);
    }

    #[test]
    fn inverted_interval_yields_zero() {
        let table = YieldTable::default();
        assert_eq!(table.produced_between(&world_with_mine(1), 900, 100), 0);
    }

    #[test]
    fn one_hour_yields_the_hourly_rate() {
        let table = YieldTable::default();
        assert_eq!(
            table.produced_between(&world_with_mine(1), 0, 3_600_000),
            50
        );
    }

    #[test]
    fn yield_scales_with_building_level() {
        let table = YieldTable::default();
        assert_eq!(
            table.produced_between(&world_with_mine(3), 0, 3_600_000),
            150
        );
    }

    #[test]
    fn yield_is_monotonic_in_elapsed_time() {
        let table = YieldTable::default();
        let world = world_with_mine(2);
        let mut previous = 0;
        for minutes in 0..120 {
            let to = i64::from(minutes).saturating_mul(60_000);
            let produced = table.produced_between(&world, 0, to);
            assert!(produced >= previous);
            previous = produced;
        }
    }

    #[test]
    fn unknown_kinds_produce_nothing() {
        let table = YieldTable::default();
        let mut world = world_with_mine(1);
        for building in &mut world.buildings {
            building.kind = "cannon".to_owned();
        }
        assert_eq!(table.produced_between(&world, 0, 3_600_000), 0);
    }
}
