//! driver.rs
//! Sensor driver contract plus a simulated headset for hardware-free runs.
//!
//! The real serial-protocol parser is an external collaborator; this module
//! owns only its public shape: validate the signal kind, connect, blocking
//! one-sample reads at a declared rate, shutdown. `SimulatedHeadset` stands
//! in for the device so the whole pipeline runs without hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

use crate::error::DriverError;

/// Channels the headset can stream. Anything outside this set fails
/// validation before a connection is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Raw,
    Attention,
    Meditation,
    Blink,
    Delta,
    Theta,
    LowAlpha,
    HighAlpha,
    LowBeta,
    HighBeta,
    LowGamma,
    MidGamma,
}

impl SignalKind {
    pub const ALL: [SignalKind; 12] = [
        SignalKind::Raw,
        SignalKind::Attention,
        SignalKind::Meditation,
        SignalKind::Blink,
        SignalKind::Delta,
        SignalKind::Theta,
        SignalKind::LowAlpha,
        SignalKind::HighAlpha,
        SignalKind::LowBeta,
        SignalKind::HighBeta,
        SignalKind::LowGamma,
        SignalKind::MidGamma,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Raw => "raw",
            SignalKind::Attention => "attention",
            SignalKind::Meditation => "meditation",
            SignalKind::Blink => "blink",
            SignalKind::Delta => "delta",
            SignalKind::Theta => "theta",
            SignalKind::LowAlpha => "low-alpha",
            SignalKind::HighAlpha => "high-alpha",
            SignalKind::LowBeta => "low-beta",
            SignalKind::HighBeta => "high-beta",
            SignalKind::LowGamma => "low-gamma",
            SignalKind::MidGamma => "mid-gamma",
        }
    }

    /// True for the 0..=100 normalized eSense channels.
    pub fn is_normalized(&self) -> bool {
        matches!(self, SignalKind::Attention | SignalKind::Meditation)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DriverError::UnknownSignalKind(s.to_string()))
    }
}

/// Validate a user-supplied kind name before any connection attempt.
pub fn validate_signal_kind(name: &str) -> Result<SignalKind, DriverError> {
    name.parse()
}

/// Contract the acquisition worker consumes. Implemented by the real
/// serial driver elsewhere; here by simulated and scripted sources.
pub trait SignalSource: Send {
    /// Declared samples per second; the worker sleeps 1/rate between reads.
    fn sample_rate(&self) -> f64;

    /// Blocking read of one sample. Transient failures are recoverable:
    /// the worker logs and keeps polling.
    fn read_one(&mut self) -> Result<f64, DriverError>;

    /// Release the underlying device. Called once when the worker exits.
    fn shutdown(&mut self) {}
}

const SIMULATED_SAMPLE_RATE_HZ: f64 = 10.0;

/// Hardware-free signal source: a bounded random walk for normalized
/// channels, centered noise for raw/band-power channels.
#[derive(Debug)]
pub struct SimulatedHeadset {
    kind: SignalKind,
    level: f64,
    rng: StdRng,
}

impl SimulatedHeadset {
    /// "Connect" to a simulated device. Kind validation happens first, then
    /// the port check, mirroring the real driver's ordering.
    pub fn connect(port: &str, kind: &str) -> Result<Self, DriverError> {
        let kind = validate_signal_kind(kind)?;
        if port.trim().is_empty() {
            return Err(DriverError::InvalidPort(
                "port must be non-empty (e.g. COM3 or /dev/ttyUSB0)".into(),
            ));
        }
        Ok(Self {
            kind,
            level: 50.0,
            rng: StdRng::from_os_rng(),
        })
    }

    #[cfg(test)]
    fn with_seed(kind: SignalKind, seed: u64) -> Self {
        Self {
            kind,
            level: 50.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SignalSource for SimulatedHeadset {
    fn sample_rate(&self) -> f64 {
        SIMULATED_SAMPLE_RATE_HZ
    }

    fn read_one(&mut self) -> Result<f64, DriverError> {
        let sample = if self.kind.is_normalized() {
            // Random walk keeps consecutive samples plausible for a
            // slow-moving mental-state channel.
            self.level = (self.level + self.rng.random_range(-6.0..6.0)).clamp(0.0, 100.0);
            self.level
        } else {
            self.rng.random_range(-2048.0..2048.0)
        };
        Ok(sample)
    }
}

/// Deterministic source replaying a fixed sequence, then repeating it.
/// Used by tests and the demo menu.
pub struct ScriptedSource {
    samples: Vec<f64>,
    cursor: usize,
    rate_hz: f64,
}

impl ScriptedSource {
    pub fn new(samples: Vec<f64>, rate_hz: f64) -> Self {
        Self {
            samples,
            cursor: 0,
            rate_hz,
        }
    }
}

impl SignalSource for ScriptedSource {
    fn sample_rate(&self) -> f64 {
        self.rate_hz
    }

    fn read_one(&mut self) -> Result<f64, DriverError> {
        if self.samples.is_empty() {
            return Err(DriverError::Read("scripted source is empty".into()));
        }
        let sample = self.samples[self.cursor % self.samples.len()];
        self.cursor += 1;
        Ok(sample)
    }
}
