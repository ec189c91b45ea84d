//! The simulation context threaded through every system call.
//!
//! State-machine actions and predicates are plain functions of
//! `(&World, EntityId)`; everything they may read or write (component rows,
//! this tick's input, animation cursors, tuning) is reached through the
//! [`World`] rather than captured or global state.

use quickstep_ecs::entity::EntityId;

use crate::animation::{AnimationCursor, AnimationCursors};
use crate::combat::HitEvent;
use crate::components::{Character, Collision, Physics};
use crate::config::SimConfig;
use crate::input::{Action, InputSnapshot};
use crate::store::ComponentStore;

/// Mutable simulation state shared by all systems during a tick.
#[derive(Debug, Clone)]
pub struct World {
    pub store: ComponentStore,
    pub input: InputSnapshot,
    pub animation: AnimationCursors,
    pub config: SimConfig,
    /// Step of the tick in progress, in seconds.
    pub dt: f32,
    /// Hits registered during the tick in progress.
    pub hits: Vec<HitEvent>,
}

impl World {
    /// An empty world sized by `config.max_entities`.
    pub fn new(config: SimConfig) -> Self {
        Self {
            store: ComponentStore::with_capacity(config.max_entities),
            input: InputSnapshot::new(),
            animation: AnimationCursors::new(),
            dt: config.fixed_dt,
            config,
            hits: Vec::new(),
        }
    }

    // -- lookups used by state actions and predicates -------------------------
    //
    // A character entity always carries Physics and Collision, so these fall
    // back to `None` only for misconfigured entities.

    pub fn physics(&self, id: EntityId) -> Option<&Physics> {
        self.store.physics(id).ok()
    }

    pub fn physics_mut(&mut self, id: EntityId) -> Option<&mut Physics> {
        self.store.physics_mut(id).ok()
    }

    pub fn collision(&self, id: EntityId) -> Option<&Collision> {
        self.store.collision(id).ok()
    }

    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.store.character(id).ok()
    }

    pub fn character_mut(&mut self, id: EntityId) -> Option<&mut Character> {
        self.store.character_mut(id).ok()
    }

    /// The animation cursor of `id`, or frame 0 if none was published.
    pub fn cursor(&self, id: EntityId) -> AnimationCursor {
        self.animation.get(id).copied().unwrap_or_default()
    }

    /// `true` if `id` is a player character and `action` went down this tick.
    pub fn is_pressed(&self, id: EntityId, action: Action) -> bool {
        self.is_player(id) && self.input.is_pressed(action)
    }

    /// `true` if `id` is a player character and `action` went up this tick.
    pub fn is_released(&self, id: EntityId, action: Action) -> bool {
        self.is_player(id) && self.input.is_released(action)
    }

    /// Horizontal input axis for `id`; always `0.0` for non-players.
    pub fn horizontal(&self, id: EntityId) -> f32 {
        if self.is_player(id) {
            self.input.horizontal()
        } else {
            0.0
        }
    }

    fn is_player(&self, id: EntityId) -> bool {
        self.character(id).is_some_and(|c| c.is_player)
    }
}
