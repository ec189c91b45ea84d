//! Static room geometry.
//!
//! Resolving bodies against a room's tiles is the job of an external
//! collaborator; the core only needs the [`StaticGeometry`] capability. A
//! [`FlatRoom`] (one floor line, two side walls, optional one-way platforms)
//! is provided for tests, benchmarks and the demo.

use serde::{Deserialize, Serialize};

use crate::components::{Collision, Physics};

/// Resolves one body against static geometry after integration.
///
/// Implementations push the body out of solid geometry, zero the blocked
/// velocity component and set the transient contact flags on `collision`
/// (which the caller has cleared beforehand).
pub trait StaticGeometry {
    fn resolve(&self, physics: &mut Physics, collision: &mut Collision, dt: f32);
}

/// A one-way platform: solid from above only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub y: f32,
    pub min_x: f32,
    pub max_x: f32,
}

/// A rectangular room with a solid floor at `floor_y` and walls at `min_x`
/// and `max_x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRoom {
    pub floor_y: f32,
    pub min_x: f32,
    pub max_x: f32,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

impl FlatRoom {
    pub fn new(floor_y: f32, min_x: f32, max_x: f32) -> Self {
        Self {
            floor_y,
            min_x,
            max_x,
            platforms: Vec::new(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platforms.push(platform);
        self
    }
}

impl StaticGeometry for FlatRoom {
    fn resolve(&self, physics: &mut Physics, collision: &mut Collision, dt: f32) {
        let rect = collision.aabb.to_world(physics.position, physics.scale);

        // Walls.
        if rect.min.x < self.min_x {
            physics.position.x += self.min_x - rect.min.x;
            physics.velocity.x = physics.velocity.x.max(0.0);
            collision.is_colliding_horizontal = true;
        } else if rect.max.x > self.max_x {
            physics.position.x -= rect.max.x - self.max_x;
            physics.velocity.x = physics.velocity.x.min(0.0);
            collision.is_colliding_horizontal = true;
        }

        // Floor.
        if rect.max.y >= self.floor_y && physics.velocity.y >= 0.0 {
            physics.position.y -= rect.max.y - self.floor_y;
            physics.velocity.y = 0.0;
            collision.is_colliding_floor = true;
            return;
        }

        // One-way platforms: only land when the feet were above the top
        // before this step's movement.
        if physics.velocity.y < 0.0 {
            return;
        }
        let previous_bottom = rect.max.y - physics.velocity.y * dt;
        for platform in &self.platforms {
            let spans = rect.max.x >= platform.min_x && rect.min.x <= platform.max_x;
            if spans && rect.max.y >= platform.y && previous_bottom <= platform.y {
                physics.position.y -= rect.max.y - platform.y;
                physics.velocity.y = 0.0;
                collision.is_colliding_ghost = true;
                return;
            }
        }
    }
}
