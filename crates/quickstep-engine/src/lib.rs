//! Quickstep Engine -- the 2D action-platformer simulation core.
//!
//! This crate builds on [`quickstep_ecs`] to provide the game-facing half of
//! the simulation: component rows, the structure-of-arrays
//! [`ComponentStore`](store::ComponentStore), the sweep-and-prune
//! [`broad_phase`], attack resolution, the stock character state graph and the
//! fixed-order [`Simulation`](tick::Simulation) tick driver.
//!
//! # Quick Start
//!
//! ```
//! use quickstep_engine::prelude::*;
//!
//! let config = SimConfig::default();
//! let room = FlatRoom::new(400.0, 0.0, 640.0);
//! let mut sim = Simulation::new(config, Box::new(room)).unwrap();
//!
//! let hero = sim.spawn_character(&CharacterTemplate::default(), Vec2::new(64.0, 300.0));
//! sim.run_ticks(120);
//!
//! // Gravity brought the hero down onto the floor.
//! let collision = sim.store().collision(hero).unwrap();
//! assert!(collision.is_on_ground());
//! ```

#![deny(unsafe_code)]

pub mod animation;
pub mod broad_phase;
pub mod character;
pub mod combat;
pub mod components;
pub mod config;
pub mod geometry;
pub mod input;
pub mod physics;
pub mod room;
pub mod store;
pub mod tick;
pub mod world;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use quickstep_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the simulation layer.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// An entity or state lookup failed.
    #[error(transparent)]
    Ecs(#[from] quickstep_ecs::EcsError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS prelude.
    pub use quickstep_ecs::prelude::*;

    pub use crate::animation::{AnimationCursor, AnimationCursors};
    pub use crate::broad_phase::{AabbSource, OverlapEvent, SourceKind, SweepAndPrune};
    pub use crate::character::{build_machine, CharacterTemplate};
    pub use crate::combat::HitEvent;
    pub use crate::components::{
        Attack, AttackPattern, Character, Collision, HitStop, Physics,
    };
    pub use crate::config::SimConfig;
    pub use crate::geometry::{Aabb, Rect, Vec2};
    pub use crate::input::{Action as InputAction, InputSnapshot};
    pub use crate::room::{FlatRoom, Platform, StaticGeometry};
    pub use crate::store::ComponentStore;
    pub use crate::tick::{Simulation, TickDiagnostics, TickReport};
    pub use crate::world::World;
    pub use crate::SimError;
}
