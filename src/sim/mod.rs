//! Simulation side of the loop: the shared 60 Hz engine shape, the
//! hysteresis policy, and the two domain state machines (race, garden).

pub mod engine;
pub mod garden;
pub mod hysteresis;
pub mod race;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which simulation a channel drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimKind {
    Race,
    Garden,
}

impl SimKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimKind::Race => "race",
            SimKind::Garden => "garden",
        }
    }
}

impl fmt::Display for SimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "race" => Ok(SimKind::Race),
            "garden" => Ok(SimKind::Garden),
            other => Err(format!("unknown simulation kind: {other}")),
        }
    }
}
