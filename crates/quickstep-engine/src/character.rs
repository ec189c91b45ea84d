//! The stock character state graph and the per-tick character system.
//!
//! [`build_machine`] wires the platformer/brawler behaviour every character
//! shares. Edge order is priority: taking a hit beats attacking, attacking
//! beats jumping, jumping beats falling, falling beats locomotion.
//!
//! ```text
//! idle  -> hurt | attack_1 | jump | fall | run
//! run   -> hurt | attack_1 | jump | fall | idle
//! jump  -> hurt | fall
//! fall  -> hurt | land
//! land  -> hurt | attack_1 | jump | run | idle
//! attack_1 -> hurt | attack_2 | idle      (attack_2 -> attack_3 likewise)
//! attack_3 -> hurt | idle
//! hurt  -> fallen | idle | fall
//! fallen -> getup                         (deleted instead when defeated)
//! getup -> hurt | idle
//! ```
//!
//! Predicates and actions are plain functions of `(&World, EntityId)`; they
//! look the entity up on every call, so the machine survives relocation.

use std::collections::HashMap;

use quickstep_ecs::component::{ComponentKind, ComponentMask};
use quickstep_ecs::entity::EntityId;
use quickstep_ecs::fsm::StateMachine;
use serde::{Deserialize, Serialize};

use crate::components::{AttackPattern, Character, Collision, Physics};
use crate::geometry::{Aabb, Vec2};
use crate::input::Action;
use crate::store::ComponentStore;
use crate::world::World;

/// Phase name used in tick diagnostics.
pub const CHARACTER_SYSTEM_NAME: &str = "characters";

pub const IDLE: &str = "idle";
pub const RUN: &str = "run";
pub const JUMP: &str = "jump";
pub const FALL: &str = "fall";
pub const LAND: &str = "land";
pub const ATTACK_1: &str = "attack_1";
pub const ATTACK_2: &str = "attack_2";
pub const ATTACK_3: &str = "attack_3";
pub const HURT: &str = "hurt";
pub const FALLEN: &str = "fallen";
pub const GETUP: &str = "getup";

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Already-parsed character prefab handed over by the asset loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterTemplate {
    pub health: f32,
    pub is_player: bool,
    /// Body box used for collision and as the hurt box.
    pub body: Aabb,
    /// Attack patterns keyed by state label.
    pub attack_patterns: HashMap<String, AttackPattern>,
}

impl Default for CharacterTemplate {
    fn default() -> Self {
        Self {
            health: 100.0,
            is_player: false,
            body: Aabb::new(Vec2::new(8.0, 14.0), Vec2::ZERO),
            attack_patterns: HashMap::new(),
        }
    }
}

impl CharacterTemplate {
    pub fn player() -> Self {
        Self {
            is_player: true,
            ..Default::default()
        }
    }

    /// Author `pattern` for the state `label`.
    pub fn with_attack(mut self, label: &str, pattern: AttackPattern) -> Self {
        self.attack_patterns.insert(label.to_owned(), pattern);
        self
    }

    /// Components a character spawned from this template carries.
    pub fn mask(&self) -> ComponentMask {
        let mut mask = ComponentKind::Physics
            | ComponentKind::Collision
            | ComponentKind::Character
            | ComponentKind::Sprite;
        if !self.attack_patterns.is_empty() {
            mask.insert(ComponentKind::Attack);
        }
        mask
    }
}

/// Create a character from `template` at `position`.
///
/// A template with attack patterns gets a self-owned Attack row that follows
/// the character's state.
pub fn spawn(store: &mut ComponentStore, template: &CharacterTemplate, position: Vec2) -> EntityId {
    let id = store.create(template.mask());
    store.physics.set(id, Physics::at(position));
    store.collision.set(id, Collision::new(template.body));

    let machine = build_machine();
    let state = machine.current_label().unwrap_or(IDLE).to_owned();
    store.character.set(
        id,
        Character {
            machine,
            previous_state: state.clone(),
            state,
            health: template.health,
            is_player: template.is_player,
            attack_patterns: template.attack_patterns.clone(),
            ..Default::default()
        },
    );
    tracing::debug!(entity = %id, player = template.is_player, "character spawned");
    id
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Build the stock character machine, starting in `idle`.
pub fn build_machine() -> StateMachine<World> {
    let mut m = StateMachine::new();

    m.add_state(IDLE, None, Some(unlock_direction), None);
    m.add_state(RUN, Some(run), Some(unlock_direction), None);
    m.add_state(JUMP, Some(airborne_jump), Some(jump_impulse), None);
    m.add_state(FALL, Some(air_control), None, None);
    m.add_state(LAND, None, None, None);
    m.add_state(ATTACK_1, None, Some(begin_attack), Some(unlock_direction));
    m.add_state(ATTACK_2, None, Some(begin_attack), Some(unlock_direction));
    m.add_state(ATTACK_3, None, Some(begin_attack), Some(unlock_direction));
    m.add_state(HURT, Some(tick_hit_stun), Some(lock_direction), Some(leave_hurt));
    m.add_state(FALLEN, Some(tick_fallen), Some(fall_down), Some(unlock_direction));
    m.add_state(GETUP, None, None, None);

    m.add_edge(IDLE, HURT, is_hit);
    m.add_edge(IDLE, ATTACK_1, attack_pressed);
    m.add_edge(IDLE, JUMP, jump_pressed);
    m.add_edge(IDLE, FALL, is_airborne);
    m.add_edge(IDLE, RUN, is_moving);

    m.add_edge(RUN, HURT, is_hit);
    m.add_edge(RUN, ATTACK_1, attack_pressed);
    m.add_edge(RUN, JUMP, jump_pressed);
    m.add_edge(RUN, FALL, is_airborne);
    m.add_edge(RUN, IDLE, is_still);

    m.add_edge(JUMP, HURT, is_hit);
    m.add_edge(JUMP, FALL, is_descending);

    m.add_edge(FALL, HURT, is_hit);
    m.add_edge(FALL, LAND, is_grounded);

    m.add_edge(LAND, HURT, is_hit);
    m.add_edge(LAND, ATTACK_1, attack_pressed);
    m.add_edge(LAND, JUMP, jump_pressed);
    m.add_edge(LAND, RUN, is_moving);
    m.add_edge(LAND, IDLE, clip_done);

    m.add_edge(ATTACK_1, HURT, is_hit);
    m.add_edge(ATTACK_1, ATTACK_2, combo_ready);
    m.add_edge(ATTACK_1, IDLE, clip_done);

    m.add_edge(ATTACK_2, HURT, is_hit);
    m.add_edge(ATTACK_2, ATTACK_3, combo_ready);
    m.add_edge(ATTACK_2, IDLE, clip_done);

    m.add_edge(ATTACK_3, HURT, is_hit);
    m.add_edge(ATTACK_3, IDLE, clip_done);

    m.add_edge(HURT, FALLEN, is_knocked_out);
    m.add_edge(HURT, IDLE, stun_over_grounded);
    m.add_edge(HURT, FALL, stun_over_airborne);

    m.add_edge(FALLEN, GETUP, recovered);

    m.add_edge(GETUP, HURT, is_hit);
    m.add_edge(GETUP, IDLE, clip_done);

    m
}

// -- predicates -------------------------------------------------------------

fn is_hit(world: &World, id: EntityId) -> bool {
    world.character(id).is_some_and(|c| c.hit_stun > 0.0)
}

fn attack_pressed(world: &World, id: EntityId) -> bool {
    world.is_pressed(id, Action::Attack)
}

fn on_ground(world: &World, id: EntityId) -> bool {
    world.collision(id).is_some_and(Collision::is_on_ground)
}

/// Jump went down while grounded, or on the tick the character left the
/// ground.
fn jump_pressed(world: &World, id: EntityId) -> bool {
    world.is_pressed(id, Action::Jump)
        && world
            .collision(id)
            .is_some_and(|c| c.is_on_ground() || c.was_on_ground)
}

fn is_airborne(world: &World, id: EntityId) -> bool {
    !on_ground(world, id)
}

fn is_grounded(world: &World, id: EntityId) -> bool {
    on_ground(world, id)
}

fn is_moving(world: &World, id: EntityId) -> bool {
    world.horizontal(id) != 0.0
}

fn is_still(world: &World, id: EntityId) -> bool {
    world.horizontal(id) == 0.0
}

fn is_descending(world: &World, id: EntityId) -> bool {
    world.physics(id).is_some_and(|p| p.velocity.y >= 0.0)
}

/// The current clip finished, or no clip is being played for this entity.
fn clip_done(world: &World, id: EntityId) -> bool {
    world
        .animation
        .get(id)
        .map_or(true, |cursor| cursor.is_at_last_frame_of_non_looping_clip)
}

fn combo_ready(world: &World, id: EntityId) -> bool {
    if !attack_pressed(world, id) {
        return false;
    }
    let frame = world.cursor(id).frame_index;
    world
        .character(id)
        .and_then(Character::current_pattern)
        .and_then(|pattern| pattern.combo_frame)
        .is_some_and(|combo| frame >= combo)
}

fn is_knocked_out(world: &World, id: EntityId) -> bool {
    world
        .character(id)
        .is_some_and(|c| c.knocked_down || c.health <= 0.0)
}

fn stun_over_grounded(world: &World, id: EntityId) -> bool {
    !is_hit(world, id) && on_ground(world, id)
}

fn stun_over_airborne(world: &World, id: EntityId) -> bool {
    !is_hit(world, id) && !on_ground(world, id)
}

fn recovered(world: &World, id: EntityId) -> bool {
    world
        .character(id)
        .is_some_and(|c| c.fallen <= 0.0 && c.health > 0.0)
}

// -- actions ----------------------------------------------------------------

fn set_locked(world: &mut World, id: EntityId, locked: bool) {
    if let Some(physics) = world.physics_mut(id) {
        physics.is_locked_direction = locked;
    }
}

fn lock_direction(world: &mut World, id: EntityId) {
    set_locked(world, id, true);
}

fn unlock_direction(world: &mut World, id: EntityId) {
    set_locked(world, id, false);
}

fn run(world: &mut World, id: EntityId) {
    let axis = world.horizontal(id);
    let speed = world.config.run_speed;
    if let Some(physics) = world.physics_mut(id) {
        physics.velocity.x = axis * speed;
        physics.set_facing(axis);
    }
}

fn air_control(world: &mut World, id: EntityId) {
    let axis = world.horizontal(id);
    if axis == 0.0 {
        return;
    }
    let speed = world.config.run_speed * world.config.air_control;
    if let Some(physics) = world.physics_mut(id) {
        physics.velocity.x = axis * speed;
        physics.set_facing(axis);
    }
}

fn jump_impulse(world: &mut World, id: EntityId) {
    let speed = world.config.jump_speed;
    if let Some(physics) = world.physics_mut(id) {
        physics.velocity.y = -speed;
    }
}

/// Air control plus the variable-height cut when jump is let go early.
fn airborne_jump(world: &mut World, id: EntityId) {
    air_control(world, id);
    let cut = world.is_released(id, Action::Jump);
    let factor = world.config.jump_cut_factor;
    if let Some(physics) = world.physics_mut(id) {
        if cut && physics.velocity.y < 0.0 {
            physics.velocity.y *= factor;
        }
    }
}

fn begin_attack(world: &mut World, id: EntityId) {
    if let Some(physics) = world.physics_mut(id) {
        physics.velocity.x = 0.0;
        physics.is_locked_direction = true;
    }
}

fn tick_hit_stun(world: &mut World, id: EntityId) {
    let dt = world.dt;
    if let Some(character) = world.character_mut(id) {
        character.hit_stun = (character.hit_stun - dt).max(0.0);
    }
}

/// Leaving hurt primes the fallen timer: the fallen state's update runs on
/// the transition tick, before its enter action.
fn leave_hurt(world: &mut World, id: EntityId) {
    let seconds = world.config.fallen_seconds;
    unlock_direction(world, id);
    if let Some(character) = world.character_mut(id) {
        character.fallen = seconds;
    }
}

fn fall_down(world: &mut World, id: EntityId) {
    lock_direction(world, id);
    if let Some(character) = world.character_mut(id) {
        character.knocked_down = false;
        character.hit_stun = 0.0;
    }
}

fn tick_fallen(world: &mut World, id: EntityId) {
    let dt = world.dt;
    let Some(character) = world.character_mut(id) else {
        return;
    };
    // Hits landing while down neither stun nor knock down again.
    character.hit_stun = 0.0;
    character.knocked_down = false;
    character.fallen = (character.fallen - dt).max(0.0);
    if character.fallen <= 0.0 && character.health <= 0.0 && world.store.delete(id) {
        tracing::debug!(entity = %id, "defeated character removed");
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Run every character's machine once. Characters frozen by hit-stop are
/// skipped; every character's hit-stop advances by one frame. Returns the
/// number of transitions taken.
pub fn run_characters(world: &mut World) -> usize {
    let dt = world.dt;
    let ids: Vec<_> = world
        .store
        .iter_with(ComponentKind::Character.into())
        .collect();

    let mut transitions = 0;
    for id in ids {
        if world.store.is_queued_for_delete(id) {
            continue;
        }
        let character = world.store.character.get_mut(id);
        if character.is_frozen() {
            character.advance_hit_stop(dt);
            continue;
        }

        // The machine is moved out for the call so actions can borrow the
        // world (including this character's row) freely.
        let mut machine = std::mem::take(&mut character.machine);
        let transitioned = machine.update(world, id);

        let character = world.store.character.get_mut(id);
        if transitioned {
            character.enter_state(machine.current_label().unwrap_or_default().to_owned());
            transitions += 1;
        }
        character.machine = machine;
        character.advance_hit_stop(dt);
    }
    transitions
}

/// Move `id` straight into `label`, bypassing its edges.
pub fn force_state(world: &mut World, id: EntityId, label: &str) -> Result<(), crate::SimError> {
    let character = world.store.character_mut(id)?;
    let mut machine = std::mem::take(&mut character.machine);
    let result = machine.force_state(world, id, label);

    let character = world.store.character.get_mut(id);
    if result.is_ok() {
        character.enter_state(machine.current_label().unwrap_or_default().to_owned());
    }
    character.machine = machine;
    result.map_err(crate::SimError::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationCursor;
    use crate::config::SimConfig;

    fn world() -> World {
        World::new(SimConfig {
            max_entities: 8,
            ..Default::default()
        })
    }

    fn grounded(world: &mut World, id: EntityId, on: bool) {
        world.store.collision_mut(id).unwrap().is_colliding_floor = on;
    }

    fn state(world: &World, id: EntityId) -> String {
        world.store.character(id).unwrap().state.clone()
    }

    fn player(world: &mut World) -> EntityId {
        let id = spawn(&mut world.store, &CharacterTemplate::player(), Vec2::ZERO);
        grounded(world, id, true);
        // First update runs idle's enter action.
        run_characters(world);
        id
    }

    #[test]
    fn graph_has_every_state() {
        let machine = build_machine();
        for label in [
            IDLE, RUN, JUMP, FALL, LAND, ATTACK_1, ATTACK_2, ATTACK_3, HURT, FALLEN, GETUP,
        ] {
            assert!(machine.has_state(label), "{label}");
        }
        assert_eq!(machine.current_label(), Some(IDLE));
    }

    #[test]
    fn spawn_fills_rows() {
        let mut world = world();
        let template = CharacterTemplate::default().with_attack(ATTACK_1, AttackPattern::default());
        let id = spawn(&mut world.store, &template, Vec2::new(5.0, 6.0));
        assert!(world.store.has(id, ComponentKind::Attack));
        assert_eq!(world.store.attack(id).unwrap().source_id, id);
        assert_eq!(world.store.physics(id).unwrap().position, Vec2::new(5.0, 6.0));
        assert_eq!(state(&world, id), IDLE);
    }

    #[test]
    fn run_then_idle_on_input() {
        let mut world = world();
        let id = player(&mut world);

        world.input.advance([Action::Left]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), RUN);
        let physics = world.store.physics(id).unwrap();
        assert_eq!(physics.velocity.x, -world.config.run_speed);
        assert_eq!(physics.facing_sign(), -1.0);

        world.input.advance([]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), IDLE);
        assert_eq!(world.store.character(id).unwrap().previous_state, RUN);
    }

    #[test]
    fn jump_impulse_waits_for_enter() {
        let mut world = world();
        let id = player(&mut world);

        world.input.advance([Action::Jump]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), JUMP);
        assert_eq!(world.store.physics(id).unwrap().velocity.y, 0.0);

        world.input.advance([Action::Jump]);
        grounded(&mut world, id, false);
        run_characters(&mut world);
        assert_eq!(
            world.store.physics(id).unwrap().velocity.y,
            -world.config.jump_speed
        );
        assert_eq!(state(&world, id), JUMP);
    }

    #[test]
    fn early_release_cuts_jump() {
        let mut world = world();
        let id = player(&mut world);
        world.input.advance([Action::Jump]);
        run_characters(&mut world);
        grounded(&mut world, id, false);
        world.input.advance([Action::Jump]);
        run_characters(&mut world);

        world.input.advance([]);
        run_characters(&mut world);
        let expected = -world.config.jump_speed * world.config.jump_cut_factor;
        assert_eq!(world.store.physics(id).unwrap().velocity.y, expected);
    }

    #[test]
    fn walking_off_a_ledge_falls_then_lands() {
        let mut world = world();
        let id = player(&mut world);
        grounded(&mut world, id, false);
        run_characters(&mut world);
        assert_eq!(state(&world, id), FALL);

        grounded(&mut world, id, true);
        run_characters(&mut world);
        assert_eq!(state(&world, id), LAND);
        run_characters(&mut world);
        assert_eq!(state(&world, id), IDLE);
    }

    #[test]
    fn jump_still_counts_on_the_tick_after_leaving_a_ledge() {
        let mut world = world();
        let id = player(&mut world);
        {
            let collision = world.store.collision_mut(id).unwrap();
            collision.is_colliding_floor = false;
            collision.was_on_ground = true;
        }
        world.input.advance([Action::Jump]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), JUMP);
    }

    #[test]
    fn jump_in_open_air_falls_instead() {
        let mut world = world();
        let id = player(&mut world);
        grounded(&mut world, id, false);
        world.input.advance([Action::Jump]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), FALL);
    }

    #[test]
    fn npc_ignores_input() {
        let mut world = world();
        let id = spawn(&mut world.store, &CharacterTemplate::default(), Vec2::ZERO);
        grounded(&mut world, id, true);
        world.input.advance([Action::Right, Action::Attack]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), IDLE);
    }

    #[test]
    fn combo_chains_only_after_combo_frame() {
        let mut world = world();
        let pattern = AttackPattern {
            combo_frame: Some(3),
            ..Default::default()
        };
        let template = CharacterTemplate::player()
            .with_attack(ATTACK_1, pattern.clone())
            .with_attack(ATTACK_2, pattern);
        let id = spawn(&mut world.store, &template, Vec2::ZERO);
        grounded(&mut world, id, true);
        let cursor = |frame_index| AnimationCursor {
            frame_index,
            is_at_last_frame_of_non_looping_clip: false,
            frame_duration: 0.1,
        };
        world.animation.set(id, cursor(0));

        world.input.advance([Action::Attack]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), ATTACK_1);

        // Pressed too early.
        world.input.advance([]);
        run_characters(&mut world);
        world.input.advance([Action::Attack]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), ATTACK_1);

        world.animation.set(id, cursor(3));
        world.input.advance([]);
        run_characters(&mut world);
        world.input.advance([Action::Attack]);
        run_characters(&mut world);
        assert_eq!(state(&world, id), ATTACK_2);
    }

    #[test]
    fn hit_sends_to_hurt_then_back_to_idle() {
        let mut world = world();
        let id = player(&mut world);
        world.store.character_mut(id).unwrap().hit_stun = 0.05;

        run_characters(&mut world);
        assert_eq!(state(&world, id), HURT);
        for _ in 0..10 {
            run_characters(&mut world);
        }
        assert_eq!(state(&world, id), IDLE);
        assert!(!world.store.physics(id).unwrap().is_locked_direction);
    }

    #[test]
    fn defeated_character_is_deleted_after_fallen_timer() {
        let mut world = world();
        let id = player(&mut world);
        {
            let character = world.store.character_mut(id).unwrap();
            character.hit_stun = 0.1;
            character.health = 0.0;
        }
        run_characters(&mut world); // -> hurt
        run_characters(&mut world); // -> fallen
        assert_eq!(state(&world, id), FALLEN);

        let ticks = (world.config.fallen_seconds / world.dt).ceil() as usize + 4;
        for _ in 0..ticks {
            run_characters(&mut world);
        }
        assert!(world.store.is_queued_for_delete(id));
        assert_eq!(state(&world, id), FALLEN);
    }

    #[test]
    fn knocked_down_survivor_gets_up() {
        let mut world = world();
        let id = player(&mut world);
        {
            let character = world.store.character_mut(id).unwrap();
            character.hit_stun = 0.1;
            character.knocked_down = true;
        }
        run_characters(&mut world);
        run_characters(&mut world);
        assert_eq!(state(&world, id), FALLEN);

        let ticks = (world.config.fallen_seconds / world.dt).ceil() as usize + 4;
        for _ in 0..ticks {
            run_characters(&mut world);
        }
        // getup finishes at once without a clip, then idle.
        run_characters(&mut world);
        assert_eq!(state(&world, id), IDLE);
        assert!(!world.store.character(id).unwrap().knocked_down);
    }

    #[test]
    fn heavy_hit_while_down_is_forgotten_on_getup() {
        let mut world = world();
        let id = player(&mut world);
        {
            let character = world.store.character_mut(id).unwrap();
            character.hit_stun = 0.1;
            character.knocked_down = true;
        }
        run_characters(&mut world);
        run_characters(&mut world);
        assert_eq!(state(&world, id), FALLEN);

        run_characters(&mut world);
        {
            let character = world.store.character_mut(id).unwrap();
            character.hit_stun = world.config.hit_stun_seconds;
            character.knocked_down = true;
        }
        let ticks = (world.config.fallen_seconds / world.dt).ceil() as usize + 4;
        for _ in 0..ticks {
            run_characters(&mut world);
        }
        run_characters(&mut world);
        assert_eq!(state(&world, id), IDLE);
        assert!(!world.store.character(id).unwrap().knocked_down);

        // A light hit afterwards only hurts.
        world.store.character_mut(id).unwrap().hit_stun = 0.05;
        for _ in 0..10 {
            run_characters(&mut world);
            assert_ne!(state(&world, id), FALLEN);
        }
        assert_eq!(state(&world, id), IDLE);
    }

    #[test]
    fn frozen_character_skips_machine() {
        let mut world = world();
        let id = player(&mut world);
        world.store.character_mut(id).unwrap().begin_hit_stop(1.0, 0);
        world.input.advance([Action::Right]);
        assert_eq!(run_characters(&mut world), 0);
        assert_eq!(state(&world, id), IDLE);
    }

    #[test]
    fn force_state_updates_labels() {
        let mut world = world();
        let id = player(&mut world);
        force_state(&mut world, id, FALL).unwrap();
        assert_eq!(state(&world, id), FALL);
        assert_eq!(world.store.character(id).unwrap().previous_state, IDLE);
        assert!(force_state(&mut world, id, "swim").is_err());
        assert_eq!(state(&world, id), FALL);
    }
}
