// Velocity Curve Mapper
// Remaps detected intensity through a perceptual response curve

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::notes::types::{MAX_VELOCITY, MIN_VELOCITY};

/// Steepness of the piano S-curve
const PIANO_STEEPNESS: f64 = 3.0;

/// Share of the curved value in the piano blend (the rest is the original)
const PIANO_CURVE_WEIGHT: f64 = 0.7;

/// Response curve applied to final note velocities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VelocityCurve {
    /// tanh S-curve blended with the original: quiet notes quieter, loud notes louder
    #[default]
    Piano,

    /// Logarithmic compression: quiet notes noticeably louder
    Soft,

    /// Square-root expansion: louder overall
    Hard,

    /// Identity
    Linear,
}

impl VelocityCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            VelocityCurve::Piano => "piano",
            VelocityCurve::Soft => "soft",
            VelocityCurve::Hard => "hard",
            VelocityCurve::Linear => "linear",
        }
    }

    /// Map a velocity through this curve
    ///
    /// Input outside [0, 127] is clamped first. The result is always in
    /// [1, 127]; a note that maps to zero stays audible.
    pub fn apply(&self, velocity: i32) -> u8 {
        let v = velocity.clamp(0, MAX_VELOCITY as i32) as f64 / MAX_VELOCITY as f64;

        let mapped = match self {
            VelocityCurve::Piano => {
                let curved = (((v - 0.5) * PIANO_STEEPNESS).tanh() + 1.0) / 2.0;
                curved * PIANO_CURVE_WEIGHT + v * (1.0 - PIANO_CURVE_WEIGHT)
            }
            VelocityCurve::Soft => {
                let e = std::f64::consts::E;
                (1.0 + v * (e - 1.0)).ln() / e.ln()
            }
            VelocityCurve::Hard => v.sqrt(),
            VelocityCurve::Linear => v,
        };

        // Truncated, not rounded
        let scaled = (mapped * MAX_VELOCITY as f64).floor();
        scaled.clamp(MIN_VELOCITY as f64, MAX_VELOCITY as f64) as u8
    }
}

impl FromStr for VelocityCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "piano" => Ok(VelocityCurve::Piano),
            "soft" => Ok(VelocityCurve::Soft),
            "hard" => Ok(VelocityCurve::Hard),
            "linear" => Ok(VelocityCurve::Linear),
            other => Err(format!(
                "unknown velocity curve '{}' (expected piano, soft, hard or linear)",
                other
            )),
        }
    }
}

/// Map a velocity through the given curve
pub fn apply_velocity_curve(velocity: i32, curve: VelocityCurve) -> u8 {
    curve.apply(velocity)
}
