//! Kinematic integration against static room geometry.
//!
//! [`run_physics_step`] is the first phase of every tick. For each entity
//! carrying [`Physics`](crate::components::Physics):
//!
//! 1. Record last tick's grounded state in `Collision::was_on_ground`.
//! 2. Apply gravity (capped at `max_fall_speed`) and, while grounded, ground
//!    friction.
//! 3. Integrate position by `velocity * dt`.
//! 4. Clear the transient contact flags and let the
//!    [`StaticGeometry`] collaborator resolve the body and set them again.
//!
//! Characters frozen by hit-stop are skipped entirely.

use quickstep_ecs::component::ComponentKind;

use crate::room::StaticGeometry;
use crate::world::World;

/// Phase name used in tick diagnostics.
pub const PHYSICS_SYSTEM_NAME: &str = "physics";

/// Integrate every physics body by `world.dt`. Returns the number of bodies
/// that moved.
pub fn run_physics_step(world: &mut World, geometry: &dyn StaticGeometry) -> usize {
    let dt = world.dt;
    let config = &world.config;
    let store = &mut world.store;
    let ids: Vec<_> = store.iter_with(ComponentKind::Physics.into()).collect();

    let mut integrated = 0;
    for id in ids {
        let mask = store.table.mask(id).unwrap_or_default();
        if mask.contains(ComponentKind::Character) && store.character.get(id).is_frozen() {
            continue;
        }

        let has_collision = mask.contains(ComponentKind::Collision);
        let physics = store.physics.get_mut(id);
        let collision = store.collision.get_mut(id);

        let grounded = has_collision && collision.is_on_ground();
        if has_collision {
            collision.was_on_ground = grounded;
        }

        if physics.has_gravity {
            physics.velocity.y = (physics.velocity.y + config.gravity * dt).min(config.max_fall_speed);
        }
        if physics.has_friction && grounded {
            let decel = config.ground_friction * dt;
            let vx = physics.velocity.x;
            physics.velocity.x = if vx.abs() <= decel {
                0.0
            } else {
                vx - decel * vx.signum()
            };
        }

        physics.position += physics.velocity * dt;

        if has_collision {
            collision.clear_contacts();
            geometry.resolve(physics, collision, dt);
        }
        integrated += 1;
    }

    tracing::trace!(integrated, "physics step");
    integrated
}
