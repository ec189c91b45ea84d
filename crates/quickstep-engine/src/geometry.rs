//! Small 2D math types shared by the physics, collision and combat systems.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

/// A 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Component-wise absolute value.
    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// An entity-relative axis-aligned box: half-extent plus offset of its centre
/// from the entity origin, both expressed for a right-facing, unscaled entity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub half: Vec2,
    #[serde(default)]
    pub offset: Vec2,
}

impl Aabb {
    pub const fn new(half: Vec2, offset: Vec2) -> Self {
        Self { half, offset }
    }

    /// Resolve to world space for an entity at `origin` with the given `scale`.
    ///
    /// The scale's sign mirrors the offset (a left-facing entity has
    /// `scale.x < 0`), its magnitude stretches both offset and half-extent.
    pub fn to_world(&self, origin: Vec2, scale: Vec2) -> Rect {
        let center = Vec2::new(
            origin.x + self.offset.x * scale.x,
            origin.y + self.offset.y * scale.y,
        );
        let half = Vec2::new(
            self.half.x.abs() * scale.x.abs(),
            self.half.y.abs() * scale.y.abs(),
        );
        Rect::from_center(center, half)
    }
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// A world-space axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Lower bound on `axis` (0 = x, 1 = y).
    #[inline]
    pub fn min_on(&self, axis: usize) -> f32 {
        if axis == 0 {
            self.min.x
        } else {
            self.min.y
        }
    }

    /// Upper bound on `axis` (0 = x, 1 = y).
    #[inline]
    pub fn max_on(&self, axis: usize) -> f32 {
        if axis == 0 {
            self.max.x
        } else {
            self.max.y
        }
    }

    /// Inclusive overlap test: rectangles sharing only an edge overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_world_mirrors_offset_for_left_facing() {
        let aabb = Aabb::new(Vec2::new(4.0, 2.0), Vec2::new(10.0, -1.0));
        let right = aabb.to_world(Vec2::new(100.0, 50.0), Vec2::ONE);
        let left = aabb.to_world(Vec2::new(100.0, 50.0), Vec2::new(-1.0, 1.0));
        assert_eq!(right.min, Vec2::new(106.0, 47.0));
        assert_eq!(left.min, Vec2::new(86.0, 47.0));
        assert_eq!(left.width(), 8.0);
    }

    #[test]
    fn to_world_stretches_half_extent() {
        let aabb = Aabb::new(Vec2::new(4.0, 2.0), Vec2::ZERO);
        let rect = aabb.to_world(Vec2::ZERO, Vec2::new(-2.0, 0.5));
        assert_eq!(rect.width(), 16.0);
        assert_eq!(rect.height(), 2.0);
    }

    #[test]
    fn touching_rects_overlap() {
        let a = Rect::from_center(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        let b = Rect::from_center(Vec2::new(2.0, 0.0), Vec2::new(1.0, 1.0));
        let c = Rect::from_center(Vec2::new(2.5, 0.0), Vec2::new(1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn degenerate_rect_overlaps_touching_point() {
        let point = Rect::from_center(Vec2::new(1.0, 0.0), Vec2::ZERO);
        let a = Rect::from_center(Vec2::ZERO, Vec2::new(1.0, 1.0));
        assert!(point.overlaps(&a));
    }
}
