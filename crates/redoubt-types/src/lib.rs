//! Shared type definitions for the Redoubt persistence engine.
//!
//! This crate is the single source of truth for the persisted player data
//! model. Types defined here are serialized as JSON blobs by
//! `redoubt-store` and manipulated by `redoubt-engine`; they carry no
//! behavior beyond cheap structural queries.
//!
//! # Modules
//!
//! - [`world`] -- The [`World`] aggregate and its entities (buildings,
//!   obstacles, army)
//! - [`state`] -- The current (v2) stored schema and the derived
//!   [`MaterializedState`] read view
//! - [`legacy`] -- The deprecated (v1) snapshot + event-log schema,
//!   retained read-only for one-time migration
//! - [`patch`] -- Minimal structural deltas between two worlds

pub mod legacy;
pub mod patch;
pub mod state;
pub mod world;

// Re-export all public types at crate root for convenience.
pub use legacy::{LegacyEvent, LegacyEventPayload, LegacySnapshot, LegacyWallet};
pub use patch::WorldPatch;
pub use state::{MaterializedState, StoredPlayerState};
pub use world::{Building, Obstacle, TroopKind, World, TOWN_HALL_KIND, WALL_KIND};
