//! Component kinds and per-entity capability masks.
//!
//! The component set is closed: every kind the simulation knows about is a
//! variant of [`ComponentKind`]. An entity's [`ComponentMask`] records which
//! component columns hold valid data for its row, and "has component" is a
//! bit test against that mask.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

// ---------------------------------------------------------------------------
// ComponentKind
// ---------------------------------------------------------------------------

/// The closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Position, velocity, facing/scale and motion flags.
    Physics,
    /// Body AABB plus transient static-collision flags.
    Collision,
    /// Attack hit-box, ownership and per-swing hit registry.
    Attack,
    /// Character state machine, timers and attack pattern table.
    Character,
    /// The entity is drawn and has an animation cursor.
    Sprite,
}

impl ComponentKind {
    /// Every kind, in bit order.
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Physics,
        ComponentKind::Collision,
        ComponentKind::Attack,
        ComponentKind::Character,
        ComponentKind::Sprite,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Stable lowercase name, used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Physics => "physics",
            ComponentKind::Collision => "collision",
            ComponentKind::Attack => "attack",
            ComponentKind::Character => "character",
            ComponentKind::Sprite => "sprite",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ComponentMask
// ---------------------------------------------------------------------------

/// A set of [`ComponentKind`]s, stored as a bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ComponentMask(u8);

impl ComponentMask {
    /// The empty set.
    pub const EMPTY: ComponentMask = ComponentMask(0);

    /// Build a mask from a list of kinds.
    pub const fn of(kinds: &[ComponentKind]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// `true` if `kind` is in the set.
    #[inline]
    pub const fn contains(self, kind: ComponentKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// `true` if every kind in `other` is also in `self`.
    #[inline]
    pub const fn contains_all(self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// `self` with `kind` added.
    #[inline]
    pub const fn with(self, kind: ComponentKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// `self` with `kind` removed.
    #[inline]
    pub const fn without(self, kind: ComponentKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    /// Add `kind` in place.
    #[inline]
    pub fn insert(&mut self, kind: ComponentKind) {
        self.0 |= kind.bit();
    }

    /// Remove `kind` in place.
    #[inline]
    pub fn remove(&mut self, kind: ComponentKind) {
        self.0 &= !kind.bit();
    }

    /// `true` if no kind is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Iterate the kinds in the set, in bit order.
    pub fn iter(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<ComponentKind> for ComponentMask {
    fn from(kind: ComponentKind) -> Self {
        Self(kind.bit())
    }
}

impl BitOr for ComponentMask {
    type Output = ComponentMask;

    fn bitor(self, rhs: ComponentMask) -> ComponentMask {
        ComponentMask(self.0 | rhs.0)
    }
}

impl BitOr<ComponentKind> for ComponentMask {
    type Output = ComponentMask;

    fn bitor(self, rhs: ComponentKind) -> ComponentMask {
        self.with(rhs)
    }
}

impl BitOr for ComponentKind {
    type Output = ComponentMask;

    fn bitor(self, rhs: ComponentKind) -> ComponentMask {
        ComponentMask::from(self).with(rhs)
    }
}

impl BitOrAssign<ComponentKind> for ComponentMask {
    fn bitor_assign(&mut self, rhs: ComponentKind) {
        self.insert(rhs);
    }
}

impl FromIterator<ComponentKind> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentKind>>(iter: I) -> Self {
        iter.into_iter().fold(ComponentMask::EMPTY, |mask, kind| mask.with(kind))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
