//! Grand Line Core - world simulation engine
//!
//! Thousands of NPC crews sail, fight, recruit and carve up territory around
//! a single player crew. The pure formulas live in `grandline-logic`; this
//! crate owns the world store and drives those formulas through periodic
//! world passes that run on a worker thread or, failing that, in small slices
//! on the caller thread.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`store`] | Keyed tables for every record, snapshots and changeset merging |
//! | [`context`] | `SimContext`: store, config, player identity, rng, pending events |
//! | [`config`] | Loading `GenerationConfig` from JSON, env override, built-in default |
//! | [`systems`] | Battle, membership, territory, ranks, movement, encounters, tasks |
//! | [`pass`] | World pass phases and their report |
//! | [`scheduler`] | Priority-ordered cooperative jobs pumped from idle time |
//! | [`executor`] | Worker-thread and caller-thread pass backends, with failover |
//! | [`coordinator`] | Cooldown, queuing, status, stats and the event feed |
//! | [`events`] | World events and the newest-first feed |
//! | [`generation`] | Procedural starting worlds |
//! | [`persistence`] | Versioned bincode saves |
//! | [`engine`] | `WorldEngine`, the entry point for hosts |
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use grandline_core::prelude::*;
//!
//! let mut engine = WorldEngine::generate(
//!     GenerationConfig::default(),
//!     &WorldGenConfig::default(),
//!     42,
//!     CoordinatorConfig::default(),
//! )
//! .unwrap();
//! engine.update_world_background(true, Instant::now()).unwrap();
//! loop {
//!     if engine.poll(Instant::now()).is_some() {
//!         break;
//!     }
//! }
//! ```

pub mod config;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod generation;
pub mod pass;
pub mod persistence;
pub mod scheduler;
pub mod store;
pub mod systems;

#[cfg(test)]
mod fixtures;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::context::{PlayerIdentity, SimContext};
    pub use crate::coordinator::{CoordinatorConfig, UpdateRequestOutcome, UpdateStats, UpdateStatus};
    pub use crate::engine::WorldEngine;
    pub use crate::error::{SimError, SimResult};
    pub use crate::events::{Importance, WorldEvent, WorldEventKind};
    pub use crate::executor::{PassOutcome, UpdateMethod};
    pub use crate::generation::WorldGenConfig;
    pub use crate::store::WorldStore;
    pub use grandline_logic::config::GenerationConfig;
}
