//! hysteresis.rs
//! Dead-band thresholding for the polled control value.
//!
//! A signal above the upper threshold nudges the internal control quantity
//! up by one sensitivity step; below the lower threshold nudges it down;
//! anything in between leaves it untouched. Separate up/down trigger points
//! keep sensor jitter near a single cutoff from oscillating the simulation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Hysteresis {
    pub lower: i32,
    pub upper: i32,
    /// Per-tick nudge applied outside the dead-band.
    pub step: i32,
    pub min: i32,
    pub max: i32,
}

impl Hysteresis {
    /// One tick of thresholding: returns the new control quantity.
    pub fn apply(&self, level: i32, signal: i32) -> i32 {
        if signal > self.upper {
            (level + self.step).min(self.max)
        } else if signal < self.lower {
            (level - self.step).max(self.min)
        } else {
            level
        }
    }
}
