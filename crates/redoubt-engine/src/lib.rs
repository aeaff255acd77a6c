//! Player world persistence and reconciliation.
//!
//! Persists each player's base against a plain blob store and
//! guarantees that whatever comes back out is playable. The store
//! offers no transactions and no compare-and-swap, so correctness
//! rests on whole-blob read-modify-write cycles, idempotency keys, and
//! convergent repair rather than on store-side coordination.
//!
//! ```text
//!                    HomeWorldReconciler
//!                    (retry / recover / repair)
//!                            │
//!                    PlayerStateService
//!            (ensure / materialize / mutate / delete)
//!        ┌───────────┬───────┴────────┬────────────┐
//!   normalize    production        patch        legacy
//!   (coerce)     (integrate)    (diff/apply)   (replay)
//!        └───────────┴───────┬────────┴────────────┘
//!                        BlobStore
//!              (Dragonfly in prod, memory in tests)
//! ```
//!
//! Time never ticks inside the engine: production is an integral
//! between the last save and "now", computed on demand, which keeps
//! every operation a pure function of stored state and a timestamp.

pub mod clock;
pub mod config;
pub mod error;
mod legacy;
pub mod materialize;
pub mod normalize;
pub mod patch;
mod paths;
pub mod production;
pub mod reconcile;
pub mod repair;
pub mod service;
pub mod starter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use error::EngineError;
pub use materialize::materialize;
pub use normalize::{clamp_balance, normalize_world};
pub use patch::{apply_patch, diff_worlds};
pub use production::{ProductionModel, YieldTable};
pub use reconcile::{HomeWorldReconciler, HomeWorldResolution};
pub use repair::{RepairOutcome, RepairReason, repair_world};
pub use service::{MutationOutcome, PlayerStateService};
pub use starter::{starter_buildings, starter_world};
