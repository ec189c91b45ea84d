//! Attack synchronisation and resolution.
//!
//! Two phases of the tick live here:
//!
//! - [`sync_attacks`] runs before the broad phase. Each Attack row that
//!   follows its owner picks up the pattern the owner authored for its
//!   current state; entering a new state re-arms the swing. A character's
//!   hit registry is cleared on every transition, so all of its hitboxes
//!   share one registry per swing. The row is enabled only while the animation frame lies in
//!   the pattern's active range.
//! - [`resolve_attacks`] runs after the broad phase and turns overlapping
//!   attack/collision pairs into hits, at most one per target per swing.

use quickstep_ecs::component::ComponentKind;
use quickstep_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};

use crate::broad_phase::{SourceKind, SweepAndPrune};
use crate::geometry::Vec2;
use crate::world::World;

/// Phase names used in tick diagnostics.
pub const ATTACK_SYNC_SYSTEM_NAME: &str = "attack_sync";
pub const ATTACK_RESOLVE_SYSTEM_NAME: &str = "attack_resolve";

/// A registered hit, reported to the audio/VFX collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    /// The attack's owner.
    pub attacker: EntityId,
    pub target: EntityId,
    pub damage: f32,
    /// Velocity change applied to the target, facing already applied.
    pub knockback: Vec2,
}

// ---------------------------------------------------------------------------
// Synchronisation
// ---------------------------------------------------------------------------

/// Refresh pattern and enabled flag of every Attack row.
pub fn sync_attacks(world: &mut World) {
    let ids: Vec<_> = world
        .store
        .iter_with(ComponentKind::Attack.into())
        .collect();

    for id in ids {
        let owner = world.store.attack.get(id).source_id;
        let follows = world.store.attack.get(id).follows_owner_state;

        // What the owner wants this tick, if the row follows it.
        let wanted = if !follows {
            None
        } else if let Ok(character) = world.store.character(owner) {
            Some((
                (character.state.clone(), character.state_entries),
                character.current_pattern().cloned(),
            ))
        } else {
            Some(((String::new(), 0), None))
        };

        let frame = world
            .animation
            .get(owner)
            .or_else(|| world.animation.get(id))
            .map_or(0, |cursor| cursor.frame_index);

        let attack = world.store.attack.get_mut(id);
        if let Some((key, pattern)) = wanted {
            if attack.armed_for.as_ref() != Some(&key) {
                tracing::trace!(entity = %id, state = key.0.as_str(), "attack re-armed");
                attack.pattern = pattern;
                attack.hit_entities.clear();
                attack.armed_for = Some(key);
            }
        }
        attack.is_enabled = attack
            .pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_active_at(frame));
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Apply every eligible overlap as a hit. Returns the number of hits.
///
/// A pair is eligible when exactly one side is an Attack box, that attack is
/// enabled, and its owner is not the other side's entity. Each target is hit
/// at most once until the attack is re-armed.
pub fn resolve_attacks(world: &mut World, broad_phase: &SweepAndPrune) -> usize {
    let candidates: Vec<(EntityId, EntityId)> = broad_phase
        .overlapping_sources()
        .filter_map(|(a, b)| match (a.kind, b.kind) {
            (SourceKind::Attack, SourceKind::Collision) => Some((a.entity, b.entity)),
            (SourceKind::Collision, SourceKind::Attack) => Some((b.entity, a.entity)),
            _ => None,
        })
        .collect();

    let mut hits = 0;
    for (attack_entity, target) in candidates {
        if apply_hit(world, attack_entity, target) {
            hits += 1;
        }
    }
    hits
}

fn apply_hit(world: &mut World, attack_entity: EntityId, target: EntityId) -> bool {
    let Ok(attack) = world.store.attack(attack_entity) else {
        return false;
    };
    let attacker = attack.source_id;
    if !attack.is_enabled || attacker == target {
        return false;
    }
    let Some(pattern) = attack.pattern.clone() else {
        return false;
    };

    let facing = world
        .store
        .physics(attacker)
        .or_else(|_| world.store.physics(attack_entity))
        .map_or(1.0, |physics| physics.facing_sign());

    // One registry per owner: every hitbox a character owns shares its swing.
    let first_hit = if world.store.has(attacker, ComponentKind::Character) {
        world.store.character.get_mut(attacker).register_hit(target)
    } else {
        world.store.attack.get_mut(attack_entity).register_hit(target)
    };
    if !first_hit {
        return false;
    }

    let knockback = Vec2::new(pattern.knockback.x * facing, pattern.knockback.y);
    if let Ok(physics) = world.store.physics_mut(target) {
        physics.velocity += knockback;
    }

    let config = &world.config;
    let store = &mut world.store;
    if store.has(target, ComponentKind::Character) {
        let character = store.character.get_mut(target);
        character.health -= pattern.damage;
        character.hit_stun = config.hit_stun_seconds;
        let magnitude = pattern.knockback.x.hypot(pattern.knockback.y);
        if magnitude >= config.knockdown_speed {
            character.knocked_down = true;
        }
        character.begin_hit_stop(config.hit_stop_seconds, config.hit_stop_lead_frames);
    }
    if store.has(attacker, ComponentKind::Character) {
        store
            .character
            .get_mut(attacker)
            .begin_hit_stop(config.hit_stop_seconds, config.hit_stop_lead_frames);
    }

    tracing::debug!(%attacker, %target, damage = pattern.damage, "hit registered");
    world.hits.push(HitEvent {
        attacker,
        target,
        damage: pattern.damage,
        knockback,
    });
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
