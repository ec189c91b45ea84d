//! Per-tick input snapshot.
//!
//! Raw device polling lives outside the simulation core. The host translates
//! whatever it polls into the set of [`Action`]s held this tick and rolls the
//! [`InputSnapshot`] forward with [`InputSnapshot::advance`]; the core only
//! asks edge (`is_pressed`, `is_released`) and level (`is_pressing`)
//! questions.

use serde::{Deserialize, Serialize};

/// Logical game actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Left,
    Right,
    Up,
    Down,
    Jump,
    Attack,
}

impl Action {
    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Held actions for this tick and the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    held: u8,
    previous: u8,
}

impl InputSnapshot {
    /// A snapshot with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Roll forward one tick: the current held set becomes the previous one
    /// and `held` becomes current.
    pub fn advance<I: IntoIterator<Item = Action>>(&mut self, held: I) {
        self.previous = self.held;
        self.held = held.into_iter().fold(0, |bits, action| bits | action.bit());
    }

    /// Went down this tick.
    #[inline]
    pub fn is_pressed(&self, action: Action) -> bool {
        self.held & action.bit() != 0 && self.previous & action.bit() == 0
    }

    /// Held this tick.
    #[inline]
    pub fn is_pressing(&self, action: Action) -> bool {
        self.held & action.bit() != 0
    }

    /// Went up this tick.
    #[inline]
    pub fn is_released(&self, action: Action) -> bool {
        self.held & action.bit() == 0 && self.previous & action.bit() != 0
    }

    /// `-1.0`, `0.0` or `1.0` from the held left/right actions.
    pub fn horizontal(&self) -> f32 {
        let mut axis = 0.0;
        if self.is_pressing(Action::Left) {
            axis -= 1.0;
        }
        if self.is_pressing(Action::Right) {
            axis += 1.0;
        }
        axis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_and_levels() {
        let mut input = InputSnapshot::new();
        input.advance([Action::Jump]);
        assert!(input.is_pressed(Action::Jump));
        assert!(input.is_pressing(Action::Jump));
        assert!(!input.is_released(Action::Jump));

        input.advance([Action::Jump]);
        assert!(!input.is_pressed(Action::Jump));
        assert!(input.is_pressing(Action::Jump));

        input.advance([]);
        assert!(input.is_released(Action::Jump));
        assert!(!input.is_pressing(Action::Jump));
    }

    #[test]
    fn horizontal_cancels_opposites() {
        let mut input = InputSnapshot::new();
        input.advance([Action::Left, Action::Right]);
        assert_eq!(input.horizontal(), 0.0);
        input.advance([Action::Left]);
        assert_eq!(input.horizontal(), -1.0);
    }
}
