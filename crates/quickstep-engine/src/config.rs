//! Simulation tuning and capacity configuration.
//!
//! [`SimConfig`] is plain data: asset loaders parse it from JSON with
//! [`SimConfig::from_json_str`] (missing fields fall back to
//! [`SimConfig::default`]) and the [`Simulation`](crate::tick::Simulation)
//! validates it once at construction.

use serde::{Deserialize, Serialize};

use crate::SimError;

/// Tuning constants and fixed capacities for one simulation.
///
/// Distances are world units, times are seconds, speeds are units per second
/// and accelerations units per second squared. `y` grows downwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Step used by [`Simulation::step`](crate::tick::Simulation::step).
    pub fixed_dt: f32,
    /// Entity capacity; component columns are allocated once at this size.
    pub max_entities: usize,
    pub gravity: f32,
    pub max_fall_speed: f32,
    /// Horizontal deceleration applied to grounded bodies with friction.
    pub ground_friction: f32,
    pub run_speed: f32,
    /// Fraction of `run_speed` available while airborne.
    pub air_control: f32,
    pub jump_speed: f32,
    /// Upward speed multiplier applied when jump is released early.
    pub jump_cut_factor: f32,
    pub hit_stun_seconds: f32,
    pub hit_stop_seconds: f32,
    /// Frames that still play after a hit before the hit-stop freeze.
    pub hit_stop_lead_frames: u32,
    pub fallen_seconds: f32,
    /// Knockback magnitude at or above which a hit knocks the target down.
    pub knockdown_speed: f32,
}

impl Default for SimConfig {
    /// 60 Hz, 1024 entities, platformer tuning.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_entities: 1024,
            gravity: 1800.0,
            max_fall_speed: 900.0,
            ground_friction: 1400.0,
            run_speed: 180.0,
            air_control: 0.8,
            jump_speed: 520.0,
            jump_cut_factor: 0.5,
            hit_stun_seconds: 0.35,
            hit_stop_seconds: 0.08,
            hit_stop_lead_frames: 1,
            fallen_seconds: 1.2,
            knockdown_speed: 400.0,
        }
    }
}

impl SimConfig {
    /// Parse a JSON document. Absent fields take their default value.
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        if self.max_entities == 0 || self.max_entities > u32::MAX as usize {
            return Err(SimError::InvalidConfig(format!(
                "max_entities must be in 1..=u32::MAX, got {}",
                self.max_entities
            )));
        }
        let non_negative = [
            ("gravity", self.gravity),
            ("max_fall_speed", self.max_fall_speed),
            ("ground_friction", self.ground_friction),
            ("run_speed", self.run_speed),
            ("air_control", self.air_control),
            ("jump_speed", self.jump_speed),
            ("jump_cut_factor", self.jump_cut_factor),
            ("hit_stun_seconds", self.hit_stun_seconds),
            ("hit_stop_seconds", self.hit_stop_seconds),
            ("fallen_seconds", self.fallen_seconds),
            ("knockdown_speed", self.knockdown_speed),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}
