//! The simulation tick driver.
//!
//! [`Simulation::tick`] advances the world by one step, running the phases in
//! a fixed order:
//!
//! 1. **physics**: integrate bodies and resolve them against room geometry.
//! 2. **attack_sync**: refresh attack patterns and enabled flags.
//! 3. **broad_phase**: rebuild the box list and update the overlap set.
//! 4. **attack_resolve**: turn attack/collision overlaps into hits.
//! 5. **characters**: run every character's state machine once.
//! 6. **compact**: apply the tick's deferred deletions.
//!
//! Compaction is the only point where entity ids change. Ids held by the
//! caller must be passed through [`TickReport::relocations`] (or revalidated)
//! before being used on the next tick.
//!
//! # Example
//!
//! ```
//! use quickstep_engine::prelude::*;
//!
//! let mut sim = Simulation::new(SimConfig::default(), Box::new(FlatRoom::new(200.0, 0.0, 400.0)))
//!     .unwrap();
//! let a = sim.create_entity(ComponentKind::Physics.into());
//! let b = sim.create_entity(ComponentKind::Physics.into());
//!
//! sim.delete_entity(a);
//! let report = sim.tick(1.0 / 60.0);
//!
//! assert_eq!(report.deleted, vec![a]);
//! assert_eq!(report.relocations, vec![Relocation { from: b, to: a }]);
//! assert_eq!(sim.store().len(), 1);
//! ```

use std::time::{Duration, Instant};

use quickstep_ecs::component::{ComponentKind, ComponentMask};
use quickstep_ecs::entity::{EntityId, Relocation};
use serde::{Deserialize, Serialize};

use crate::animation::AnimationCursors;
use crate::broad_phase::SweepAndPrune;
use crate::character::{self, CharacterTemplate, CHARACTER_SYSTEM_NAME};
use crate::combat::{self, HitEvent, ATTACK_RESOLVE_SYSTEM_NAME, ATTACK_SYNC_SYSTEM_NAME};
use crate::components::Attack;
use crate::config::SimConfig;
use crate::geometry::Vec2;
use crate::input::{Action, InputSnapshot};
use crate::physics::{self, PHYSICS_SYSTEM_NAME};
use crate::room::StaticGeometry;
use crate::store::ComponentStore;
use crate::world::World;
use crate::SimError;

/// Phase names used in tick diagnostics.
pub const BROAD_PHASE_SYSTEM_NAME: &str = "broad_phase";
pub const COMPACT_SYSTEM_NAME: &str = "compact";

// ---------------------------------------------------------------------------
// TickReport / TickDiagnostics
// ---------------------------------------------------------------------------

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Number of the tick that just ran, starting at 1.
    pub tick: u64,
    pub hits: Vec<HitEvent>,
    /// Survivors whose id changed during compaction.
    pub relocations: Vec<Relocation>,
    /// Pre-compaction ids removed at the end of the tick.
    pub deleted: Vec<EntityId>,
}

/// Timing and broad-phase diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per phase, in execution order.
    pub system_times: Vec<(&'static str, Duration)>,
    /// Total time for the tick.
    pub total_time: Duration,
    /// Boxes fed to the broad phase.
    pub sources: usize,
    /// Overlapping pairs after the broad phase.
    pub overlaps: usize,
    /// The broad phase took its full-rebuild path.
    pub broad_phase_rebuilt: bool,
    /// Adjacent endpoint swaps in an incremental broad-phase update.
    pub broad_phase_swaps: usize,
    /// State-machine transitions taken.
    pub transitions: usize,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// The single-threaded simulation core.
///
/// Owns the [`World`], the room geometry collaborator and the broad phase,
/// and runs the phases of a tick in a fixed order.
pub struct Simulation {
    world: World,
    geometry: Box<dyn StaticGeometry>,
    broad_phase: SweepAndPrune,
    tick_counter: u64,
    /// Sum of the steps taken so far.
    sim_time: f64,
    last_diagnostics: TickDiagnostics,
}

impl Simulation {
    /// Create an empty simulation. The configuration is validated once here.
    pub fn new(config: SimConfig, geometry: Box<dyn StaticGeometry>) -> Result<Self, SimError> {
        config.validate()?;
        tracing::info!(
            max_entities = config.max_entities,
            fixed_dt = config.fixed_dt,
            "simulation created"
        );
        Ok(Self {
            world: World::new(config),
            geometry,
            broad_phase: SweepAndPrune::new(),
            tick_counter: 0,
            sim_time: 0.0,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Append an entity carrying `mask` with default rows.
    ///
    /// # Panics
    ///
    /// Panics if `max_entities` is exceeded.
    pub fn create_entity(&mut self, mask: ComponentMask) -> EntityId {
        self.world.store.create(mask)
    }

    /// Queue `id` for deletion at the end of the next tick. Deleting a
    /// non-live or already queued id does nothing.
    pub fn delete_entity(&mut self, id: EntityId) -> bool {
        self.world.store.delete(id)
    }

    /// Spawn a character from `template` at `position`.
    pub fn spawn_character(&mut self, template: &CharacterTemplate, position: Vec2) -> EntityId {
        character::spawn(&mut self.world.store, template, position)
    }

    /// Spawn a child hit-box that takes its pattern from `owner`'s state and
    /// resolves against `owner`'s position.
    pub fn spawn_hitbox(&mut self, owner: EntityId) -> Result<EntityId, SimError> {
        self.world.store.character(owner)?;
        let id = self.world.store.create(ComponentKind::Attack.into());
        *self.world.store.attack_mut(id)? = Attack::following(owner);
        Ok(id)
    }

    /// Move a character straight into `label`, bypassing its edges.
    pub fn force_state(&mut self, id: EntityId, label: &str) -> Result<(), SimError> {
        character::force_state(&mut self.world, id, label)
    }

    // -- collaborators ------------------------------------------------------

    /// Replace this tick's input snapshot.
    pub fn set_input(&mut self, input: InputSnapshot) {
        self.world.input = input;
    }

    /// Roll the input snapshot forward with the actions held this tick.
    pub fn advance_input<I: IntoIterator<Item = Action>>(&mut self, held: I) {
        self.world.input.advance(held);
    }

    pub fn input(&self) -> &InputSnapshot {
        &self.world.input
    }

    /// Animation cursors published by the animation collaborator.
    pub fn animation_mut(&mut self) -> &mut AnimationCursors {
        &mut self.world.animation
    }

    pub fn animation(&self) -> &AnimationCursors {
        &self.world.animation
    }

    // -- ticking ------------------------------------------------------------

    /// Advance the simulation by `dt` seconds.
    ///
    /// # Panics
    ///
    /// Panics if `dt` is not positive and finite.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        assert!(
            dt > 0.0 && dt.is_finite(),
            "dt must be positive and finite, got {dt}"
        );
        let tick = self.tick_counter + 1;
        let span = tracing::debug_span!("tick", tick);
        let _guard = span.enter();

        let tick_start = Instant::now();
        let mut system_times = Vec::with_capacity(6);
        self.world.dt = dt;
        self.world.hits.clear();

        // Phase 1: physics.
        let start = Instant::now();
        physics::run_physics_step(&mut self.world, self.geometry.as_ref());
        system_times.push((PHYSICS_SYSTEM_NAME, start.elapsed()));

        // Phase 2: attack patterns and activation.
        let start = Instant::now();
        combat::sync_attacks(&mut self.world);
        system_times.push((ATTACK_SYNC_SYSTEM_NAME, start.elapsed()));

        // Phase 3: broad phase.
        let start = Instant::now();
        self.broad_phase.rebuild_sources(&self.world.store);
        self.broad_phase.update();
        system_times.push((BROAD_PHASE_SYSTEM_NAME, start.elapsed()));

        // Phase 4: hits.
        let start = Instant::now();
        combat::resolve_attacks(&mut self.world, &self.broad_phase);
        system_times.push((ATTACK_RESOLVE_SYSTEM_NAME, start.elapsed()));

        // Phase 5: state machines.
        let start = Instant::now();
        let transitions = character::run_characters(&mut self.world);
        system_times.push((CHARACTER_SYSTEM_NAME, start.elapsed()));

        // Phase 6: deferred deletion.
        let start = Instant::now();
        let compaction = self.world.store.compact();
        self.world.animation.apply_compaction(&compaction);
        system_times.push((COMPACT_SYSTEM_NAME, start.elapsed()));

        if !compaction.is_empty() {
            tracing::debug!(
                removed = compaction.removed.len(),
                relocated = compaction.relocations.len(),
                live = self.world.store.len(),
                "compacted"
            );
        }

        self.tick_counter = tick;
        self.sim_time += f64::from(dt);
        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            sources: self.broad_phase.sources().len(),
            overlaps: self.broad_phase.overlap_count(),
            broad_phase_rebuilt: self.broad_phase.rebuilt_last_update(),
            broad_phase_swaps: self.broad_phase.last_swap_count(),
            transitions,
        };

        TickReport {
            tick,
            hits: std::mem::take(&mut self.world.hits),
            relocations: compaction.relocations,
            deleted: compaction.removed,
        }
    }

    /// Advance by the configured fixed step.
    pub fn step(&mut self) -> TickReport {
        let dt = self.world.config.fixed_dt;
        self.tick(dt)
    }

    /// Run `count` fixed steps. Returns the number of hits registered.
    pub fn run_ticks(&mut self, count: u64) -> usize {
        let mut hits = 0;
        for _ in 0..count {
            hits += self.step().hits.len();
        }
        hits
    }

    // -- accessors ----------------------------------------------------------

    /// The number of ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulated seconds elapsed.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn config(&self) -> &SimConfig {
        &self.world.config
    }

    /// Component rows, for the rendering/animation/audio collaborators.
    pub fn store(&self) -> &ComponentStore {
        &self.world.store
    }

    /// Mutable component rows, for setup and tests.
    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.world.store
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn broad_phase(&self) -> &SweepAndPrune {
        &self.broad_phase
    }

    /// Diagnostics from the last tick.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick_counter)
            .field("live", &self.world.store.len())
            .field("overlaps", &self.broad_phase.overlap_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationCursor;
    use crate::character::{ATTACK_1, HURT, IDLE};
    use crate::components::AttackPattern;
    use crate::geometry::Aabb;
    use crate::room::FlatRoom;

    const DT: f32 = 1.0 / 60.0;

    fn sim() -> Simulation {
        let config = SimConfig {
            max_entities: 32,
            ..Default::default()
        };
        Simulation::new(config, Box::new(FlatRoom::new(400.0, 0.0, 1000.0))).unwrap()
    }

    fn jab() -> AttackPattern {
        AttackPattern {
            aabb: Aabb::new(Vec2::new(8.0, 6.0), Vec2::new(14.0, 0.0)),
            active_start: 0,
            active_end: 4,
            damage: 10.0,
            knockback: Vec2::new(150.0, -60.0),
            combo_frame: Some(2),
        }
    }

    fn brawler() -> CharacterTemplate {
        CharacterTemplate::default().with_attack(ATTACK_1, jab())
    }

    /// Two characters standing 20 units apart on the floor.
    fn standoff() -> (Simulation, EntityId, EntityId) {
        let mut sim = sim();
        let attacker = sim.spawn_character(&brawler(), Vec2::new(100.0, 386.0));
        let defender = sim.spawn_character(&CharacterTemplate::default(), Vec2::new(120.0, 386.0));
        sim.run_ticks(5);
        (sim, attacker, defender)
    }

    // -- counters -----------------------------------------------------------

    #[test]
    fn tick_advances_counter_and_time() {
        let mut sim = sim();
        sim.run_ticks(10);
        assert_eq!(sim.tick_count(), 10);
        assert!((sim.sim_time() - 10.0 * f64::from(DT)).abs() < 1e-6);

        let report = sim.tick(0.5 * DT);
        assert_eq!(report.tick, 11);
        assert!((sim.sim_time() - 10.5 * f64::from(DT)).abs() < 1e-6);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimConfig {
            fixed_dt: -1.0,
            ..Default::default()
        };
        let result = Simulation::new(config, Box::new(FlatRoom::new(0.0, 0.0, 1.0)));
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    #[should_panic(expected = "dt must be positive")]
    fn zero_dt_panics() {
        sim().tick(0.0);
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn exceeding_capacity_panics() {
        let mut sim = sim();
        for _ in 0..33 {
            sim.create_entity(ComponentKind::Physics.into());
        }
    }

    // -- lifecycle ----------------------------------------------------------

    #[test]
    fn delete_id_two_of_five_relocates_four() {
        let mut sim = sim();
        let ids: Vec<_> = (0..5)
            .map(|i| {
                let id = sim.create_entity(ComponentKind::Physics.into());
                sim.store_mut().physics_mut(id).unwrap().depth = i as f32;
                id
            })
            .collect();
        sim.animation_mut().set(
            ids[4],
            AnimationCursor {
                frame_index: 7,
                ..Default::default()
            },
        );

        sim.delete_entity(ids[2]);
        let report = sim.tick(DT);

        assert_eq!(sim.store().len(), 4);
        assert_eq!(report.deleted, vec![ids[2]]);
        assert_eq!(
            report.relocations,
            vec![Relocation {
                from: ids[4],
                to: ids[2]
            }]
        );
        assert_eq!(sim.store().physics(ids[2]).unwrap().depth, 4.0);
        assert!(sim.store().physics(ids[4]).is_err());
        assert_eq!(sim.animation().get(ids[2]).unwrap().frame_index, 7);
        assert!(sim.animation().get(ids[4]).is_none());
    }

    #[test]
    fn deletion_is_deferred_to_end_of_tick() {
        let mut sim = sim();
        let id = sim.create_entity(ComponentKind::Physics.into());
        assert!(sim.delete_entity(id));
        assert!(!sim.delete_entity(id));
        assert_eq!(sim.store().len(), 1);
        sim.step();
        assert_eq!(sim.store().len(), 0);
    }

    // -- gameplay -----------------------------------------------------------

    #[test]
    fn characters_settle_on_floor() {
        let (sim, attacker, defender) = standoff();
        for id in [attacker, defender] {
            assert!(sim.store().collision(id).unwrap().is_on_ground());
            assert_eq!(sim.store().character(id).unwrap().state, IDLE);
        }
    }

    #[test]
    fn forced_attack_hits_once_and_reports() {
        let (mut sim, attacker, defender) = standoff();
        sim.animation_mut().set(
            attacker,
            AnimationCursor {
                frame_index: 0,
                is_at_last_frame_of_non_looping_clip: false,
                frame_duration: 0.05,
            },
        );
        sim.force_state(attacker, ATTACK_1).unwrap();

        let mut hits = Vec::new();
        for _ in 0..8 {
            hits.extend(sim.step().hits);
        }
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].attacker, attacker);
        assert_eq!(hits[0].target, defender);
        assert_eq!(sim.store().character(defender).unwrap().health, 90.0);
    }

    #[test]
    fn extra_hitbox_does_not_double_a_swing() {
        let (mut sim, attacker, defender) = standoff();
        sim.spawn_hitbox(attacker).unwrap();
        sim.animation_mut().set(attacker, AnimationCursor::default());
        sim.force_state(attacker, ATTACK_1).unwrap();

        let hits: usize = (0..8).map(|_| sim.step().hits.len()).sum();
        assert_eq!(hits, 1);
        assert_eq!(sim.store().character(defender).unwrap().health, 90.0);
    }

    #[test]
    fn hit_target_plays_impact_frame_then_freezes() {
        let (mut sim, attacker, defender) = standoff();
        sim.force_state(attacker, ATTACK_1).unwrap();
        sim.animation_mut().set(attacker, AnimationCursor::default());

        let report = sim.step();
        assert_eq!(report.hits.len(), 1);
        // The impact frame ran the machine: the defender is heading to hurt.
        assert_eq!(sim.store().character(defender).unwrap().state, HURT);

        // Now frozen: knockback velocity is held but not integrated.
        let before = sim.store().physics(defender).unwrap().position;
        sim.step();
        assert_eq!(sim.store().physics(defender).unwrap().position, before);
        assert!(sim.store().character(defender).unwrap().is_frozen());
    }

    #[test]
    fn child_hitbox_is_orphaned_when_owner_is_deleted() {
        let (mut sim, attacker, _) = standoff();
        let hitbox = sim.spawn_hitbox(attacker).unwrap();
        sim.delete_entity(attacker);
        let report = sim.tick(DT);

        let hitbox = report
            .relocations
            .iter()
            .find(|r| r.from == hitbox)
            .map_or(hitbox, |r| r.to);
        let attack = sim.store().attack(hitbox).unwrap();
        assert_eq!(attack.source_id, hitbox);
        assert!(!attack.is_enabled);
    }

    #[test]
    fn spawn_hitbox_requires_character_owner() {
        let mut sim = sim();
        let plain = sim.create_entity(ComponentKind::Physics.into());
        assert!(sim.spawn_hitbox(plain).is_err());
    }

    #[test]
    fn diagnostics_record_every_phase() {
        let (mut sim, _, _) = standoff();
        sim.step();
        let diag = sim.last_diagnostics();
        let names: Vec<_> = diag.system_times.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                PHYSICS_SYSTEM_NAME,
                ATTACK_SYNC_SYSTEM_NAME,
                BROAD_PHASE_SYSTEM_NAME,
                ATTACK_RESOLVE_SYSTEM_NAME,
                CHARACTER_SYSTEM_NAME,
                COMPACT_SYSTEM_NAME,
            ]
        );
        assert_eq!(diag.sources, 2);
        assert!(!diag.broad_phase_rebuilt);
        assert_eq!(diag.overlaps, 0);
    }

    #[test]
    fn identical_runs_are_identical() {
        fn run() -> Vec<(Vec2, Vec2, String)> {
            let mut sim = sim();
            sim.spawn_character(&CharacterTemplate::player(), Vec2::new(50.0, 300.0));
            sim.spawn_character(&brawler(), Vec2::new(90.0, 300.0));
            for tick in 0..120u32 {
                let held: &[Action] = match tick % 40 {
                    0..=9 => &[Action::Right],
                    10 => &[Action::Jump],
                    11..=15 => &[Action::Jump, Action::Left],
                    _ => &[],
                };
                sim.advance_input(held.iter().copied());
                sim.step();
            }
            sim.store()
                .iter()
                .map(|id| {
                    let physics = sim.store().physics(id).unwrap();
                    let state = sim.store().character(id).unwrap().state.clone();
                    (physics.position, physics.velocity, state)
                })
                .collect()
        }
        assert_eq!(run(), run());
    }
}
