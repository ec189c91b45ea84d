//! Component row types stored in the [`ComponentStore`](crate::store::ComponentStore).
//!
//! Every type here is `Default` because columns are pre-sized and rows that
//! do not carry a component hold the default value.

use std::collections::{HashMap, HashSet};

use quickstep_ecs::entity::EntityId;
use quickstep_ecs::fsm::StateMachine;
use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Vec2};
use crate::world::World;

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Kinematic state of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Physics {
    /// World position of the entity origin (y grows downwards).
    pub position: Vec2,
    /// Draw-order depth; not used by collision.
    pub depth: f32,
    /// Velocity in units per second.
    pub velocity: Vec2,
    /// Sign of `x` is the facing direction (negative = left); magnitude is a
    /// non-uniform stretch applied to boxes.
    pub scale: Vec2,
    pub has_gravity: bool,
    pub has_friction: bool,
    /// While set, [`set_facing`](Self::set_facing) is ignored.
    pub is_locked_direction: bool,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            depth: 0.0,
            velocity: Vec2::ZERO,
            scale: Vec2::ONE,
            has_gravity: false,
            has_friction: false,
            is_locked_direction: false,
        }
    }
}

impl Physics {
    /// A physics row at `position` with gravity and friction enabled.
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            has_gravity: true,
            has_friction: true,
            ..Default::default()
        }
    }

    /// `-1.0` when facing left, `1.0` otherwise.
    #[inline]
    pub fn facing_sign(&self) -> f32 {
        if self.scale.x < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    /// Turn to face `sign` (its sign only). Ignored while the direction is
    /// locked or `sign` is zero.
    pub fn set_facing(&mut self, sign: f32) {
        if self.is_locked_direction || sign == 0.0 {
            return;
        }
        let magnitude = self.scale.x.abs();
        self.scale.x = if sign < 0.0 { -magnitude } else { magnitude };
    }
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// Body box and the flags written by the static-geometry resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    pub aabb: Aabb,
    pub is_colliding_floor: bool,
    /// Standing on a one-way platform.
    pub is_colliding_ghost: bool,
    pub is_colliding_slope: bool,
    pub is_colliding_horizontal: bool,
    /// Grounded state from the previous tick. A jump is still accepted on
    /// the first tick after leaving the ground.
    pub was_on_ground: bool,
}

impl Collision {
    pub fn new(aabb: Aabb) -> Self {
        Self {
            aabb,
            ..Default::default()
        }
    }

    /// Supported by floor, platform or slope this tick.
    #[inline]
    pub fn is_on_ground(&self) -> bool {
        self.is_colliding_floor || self.is_colliding_ghost || self.is_colliding_slope
    }

    /// Clear the per-tick flags before the resolver runs.
    pub fn clear_contacts(&mut self) {
        self.is_colliding_floor = false;
        self.is_colliding_ghost = false;
        self.is_colliding_slope = false;
        self.is_colliding_horizontal = false;
    }
}

// ---------------------------------------------------------------------------
// Attack
// ---------------------------------------------------------------------------

/// One attack's hit-box and effect, as authored for a combat state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackPattern {
    pub aabb: Aabb,
    /// First active animation frame.
    pub active_start: u32,
    /// One past the last active animation frame.
    pub active_end: u32,
    pub damage: f32,
    /// Applied to the target; `x` is mirrored by the attacker's facing.
    pub knockback: Vec2,
    /// Frame from which the next attack in the chain may be triggered.
    #[serde(default)]
    pub combo_frame: Option<u32>,
}

impl AttackPattern {
    /// `true` if the active range covers at least one frame.
    #[inline]
    pub fn spans_frames(&self) -> bool {
        self.active_end > self.active_start
    }

    /// `true` if `frame` lies in the active range.
    #[inline]
    pub fn is_active_at(&self, frame: u32) -> bool {
        self.spans_frames() && frame >= self.active_start && frame < self.active_end
    }
}

/// An attack hit-box owned by `source_id`.
///
/// The component may sit on the attacking character itself (then
/// `source_id` is the entity's own id) or on a child entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub pattern: Option<AttackPattern>,
    /// Owner state label and entry serial the pattern was armed for.
    pub armed_for: Option<(String, u32)>,
    pub is_enabled: bool,
    pub source_id: EntityId,
    /// When set, the pattern follows the owner's current state; otherwise
    /// `pattern` is fixed (projectiles, traps).
    pub follows_owner_state: bool,
    /// Targets already struck during the current activation. Only consulted
    /// when the owner is not a character; characters keep one registry for
    /// every attack they own.
    pub hit_entities: HashSet<EntityId>,
}

impl Default for Attack {
    fn default() -> Self {
        Self {
            pattern: None,
            armed_for: None,
            is_enabled: false,
            source_id: EntityId::new(0),
            follows_owner_state: true,
            hit_entities: HashSet::new(),
        }
    }
}

impl Attack {
    /// An attack that takes its pattern from `owner`'s state table.
    pub fn following(owner: EntityId) -> Self {
        Self {
            source_id: owner,
            ..Default::default()
        }
    }

    /// An attack with a fixed pattern.
    pub fn fixed(owner: EntityId, pattern: AttackPattern) -> Self {
        Self {
            pattern: Some(pattern),
            source_id: owner,
            follows_owner_state: false,
            ..Default::default()
        }
    }

    /// Record a hit on `target`. Returns `false` if it was already hit during
    /// this activation.
    pub fn register_hit(&mut self, target: EntityId) -> bool {
        self.hit_entities.insert(target)
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// Where an entity is in its hit-stop cycle this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitStop {
    /// No hit-stop pending.
    Running,
    /// Hit-stop pending, but this frame still plays so the impact is visible.
    Impact,
    /// Physics and state are frozen.
    Frozen,
}

/// Behaviour state of a character.
#[derive(Debug, Clone, Default)]
pub struct Character {
    pub machine: StateMachine<World>,
    pub state: String,
    pub previous_state: String,
    /// Incremented on every state transition.
    pub state_entries: u32,
    pub health: f32,
    /// Reads input when set; otherwise input predicates are always false.
    pub is_player: bool,
    pub hit_stun: f32,
    pub fallen: f32,
    /// Set by a heavy hit; cleared while fallen.
    pub knocked_down: bool,
    pub hit_stop: f32,
    pub hit_stop_lead_frames: u32,
    pub is_first_hit_stop_frame: bool,
    pub attack_patterns: HashMap<String, AttackPattern>,
    /// Targets struck by any attack this character owns since it entered
    /// the current state.
    pub hit_entities: HashSet<EntityId>,
}

impl Character {
    /// The pattern authored for the current state, if any.
    pub fn current_pattern(&self) -> Option<&AttackPattern> {
        self.attack_patterns.get(&self.state)
    }

    /// Record a transition into `next`. The swing's hit registry starts
    /// empty in every new state.
    pub fn enter_state(&mut self, next: String) {
        self.previous_state = std::mem::replace(&mut self.state, next);
        self.state_entries = self.state_entries.wrapping_add(1);
        self.hit_entities.clear();
    }

    /// Record a hit on `target` by one of this character's attacks. Returns
    /// `false` if it was already hit in the current state.
    pub fn register_hit(&mut self, target: EntityId) -> bool {
        self.hit_entities.insert(target)
    }

    /// Start a hit-stop of `seconds`, letting `lead_frames` frames play
    /// before the freeze begins.
    pub fn begin_hit_stop(&mut self, seconds: f32, lead_frames: u32) {
        if seconds <= 0.0 {
            return;
        }
        self.hit_stop = seconds;
        self.hit_stop_lead_frames = lead_frames;
        self.is_first_hit_stop_frame = true;
    }

    /// The hit-stop phase for the current frame, without advancing it.
    pub fn hit_stop_phase(&self) -> HitStop {
        if self.hit_stop <= 0.0 {
            HitStop::Running
        } else if self.hit_stop_lead_frames > 0 {
            HitStop::Impact
        } else {
            HitStop::Frozen
        }
    }

    /// `true` while physics and state updates must be skipped.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.hit_stop_phase() == HitStop::Frozen
    }

    /// Advance the hit-stop by one frame of `dt` seconds.
    pub fn advance_hit_stop(&mut self, dt: f32) {
        match self.hit_stop_phase() {
            HitStop::Running => {}
            HitStop::Impact => {
                self.hit_stop_lead_frames -= 1;
                self.is_first_hit_stop_frame = false;
            }
            HitStop::Frozen => {
                self.is_first_hit_stop_frame = false;
                self.hit_stop = (self.hit_stop - dt).max(0.0);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
