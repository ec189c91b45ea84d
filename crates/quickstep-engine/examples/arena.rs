//! Headless brawl: one scripted player against a crowd of dummies.
//!
//! Run with:
//!   RUST_LOG=quickstep_engine=debug cargo run --example arena -p quickstep-engine
//!
//! An optional first argument names a JSON file with `SimConfig` overrides.

use anyhow::Context;
use quickstep_engine::character::{ATTACK_1, ATTACK_2, ATTACK_3};
use quickstep_engine::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing_subscriber::EnvFilter;

const FLOOR_Y: f32 = 480.0;
const TICKS: u64 = 900;
/// Frames per attack clip.
const ATTACK_FRAMES: u32 = 8;

fn combo_pattern(damage: f32, knockback: Vec2) -> AttackPattern {
    AttackPattern {
        aabb: Aabb::new(Vec2::new(12.0, 8.0), Vec2::new(18.0, -2.0)),
        active_start: 2,
        active_end: 5,
        damage,
        knockback,
        combo_frame: Some(4),
    }
}

fn load_config() -> anyhow::Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config from {path}"))?;
            SimConfig::from_json_str(&json).with_context(|| format!("parsing {path}"))
        }
        None => Ok(SimConfig::default()),
    }
}

/// Stand-in for the animation collaborator: attack clips advance one frame
/// every three ticks and stop on their last frame.
fn publish_cursors(sim: &mut Simulation, clock: &mut Vec<(EntityId, String, u32)>) {
    let characters: Vec<_> = sim
        .store()
        .iter_with(ComponentKind::Character.into())
        .filter_map(|id| Some((id, sim.store().character(id).ok()?.state.clone())))
        .collect();
    clock.retain(|(id, _, _)| sim.store().contains(*id));

    for (id, state) in characters {
        let slot = match clock.iter().position(|(owner, _, _)| *owner == id) {
            Some(slot) => slot,
            None => {
                clock.push((id, state.clone(), 0));
                clock.len() - 1
            }
        };
        let entry = &mut clock[slot];
        if entry.1 != state {
            *entry = (id, state.clone(), 0);
        } else {
            entry.2 += 1;
        }
        let frame_index = (entry.2 / 3).min(ATTACK_FRAMES - 1);
        let looping = !matches!(state.as_str(), ATTACK_1 | ATTACK_2 | ATTACK_3);
        sim.animation_mut().set(
            id,
            AnimationCursor {
                frame_index,
                is_at_last_frame_of_non_looping_clip: !looping
                    && frame_index == ATTACK_FRAMES - 1,
                frame_duration: 0.05,
            },
        );
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let room = FlatRoom::new(FLOOR_Y, 0.0, 960.0).with_platform(Platform {
        y: 400.0,
        min_x: 300.0,
        max_x: 500.0,
    });
    let mut sim = Simulation::new(config, Box::new(room))?;

    let mut hero = sim.spawn_character(
        &CharacterTemplate::player()
            .with_attack(ATTACK_1, combo_pattern(8.0, Vec2::new(120.0, -40.0)))
            .with_attack(ATTACK_2, combo_pattern(10.0, Vec2::new(160.0, -60.0)))
            .with_attack(ATTACK_3, combo_pattern(16.0, Vec2::new(380.0, -220.0))),
        Vec2::new(120.0, FLOOR_Y - 14.0),
    );

    let mut rng = Pcg64::seed_from_u64(2024);
    for _ in 0..6 {
        let x = rng.gen_range(180.0..900.0);
        sim.spawn_character(
            &CharacterTemplate {
                health: rng.gen_range(30.0..60.0),
                ..Default::default()
            },
            Vec2::new(x, rng.gen_range(100.0..300.0)),
        );
    }
    tracing::info!(live = sim.store().len(), "arena populated");

    let mut clock = Vec::new();
    let mut total_hits = 0;
    for tick in 0..TICKS {
        // Walk right, jabbing three times every second.
        let held: &[InputAction] = match tick % 60 {
            0 | 8 | 16 => &[InputAction::Attack],
            30..=50 => &[InputAction::Right],
            _ => &[],
        };
        sim.advance_input(held.iter().copied());
        publish_cursors(&mut sim, &mut clock);

        let report = sim.step();
        for hit in &report.hits {
            tracing::info!(
                tick = report.tick,
                attacker = %hit.attacker,
                target = %hit.target,
                damage = hit.damage,
                "hit"
            );
        }
        total_hits += report.hits.len();
        if let Some(moved) = report.relocations.iter().find(|r| r.from == hero) {
            hero = moved.to;
        }
        for id in &report.deleted {
            tracing::info!(tick = report.tick, entity = %id, "knocked out");
        }
        if sim.store().len() == 1 {
            tracing::info!(tick = report.tick, "arena cleared");
            break;
        }
    }

    let diag = sim.last_diagnostics();
    tracing::info!(
        ticks = sim.tick_count(),
        hits = total_hits,
        survivors = sim.store().len(),
        overlaps = diag.overlaps,
        last_tick_us = diag.total_time.as_micros() as u64,
        "done"
    );
    if let Ok(physics) = sim.store().physics(hero) {
        tracing::info!(x = physics.position.x, y = physics.position.y, "hero position");
    }
    Ok(())
}
