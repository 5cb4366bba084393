//! error.rs
//! Error taxonomy for the biofeedback pipeline.
//!
//! Every failure here degrades a single channel (acquisition refuses to
//! start, one control tick is skipped, a process lingers one extra tick);
//! nothing is fatal to the monitoring process.

use thiserror::Error;

/// Errors raised by the sensor driver contract.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Signal kind not in the supported set. Rejected before any
    /// connection attempt, never silently defaulted.
    #[error("unknown signal kind: {0}")]
    UnknownSignalKind(String),

    /// Missing or malformed serial port spec.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// Device did not answer on the given port.
    #[error("device unreachable on {port}: {reason}")]
    Unreachable { port: String, reason: String },

    /// Transient read failure. The acquisition loop logs and continues.
    #[error("read failed: {0}")]
    Read(String),
}

/// Errors creating or opening the shared control cell.
/// Reads and writes on an established bridge are infallible.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mmap failed: {0}")]
    Map(String),
}

/// Errors from the process lifecycle manager. Only `start` can fail;
/// `stop` logs and escalates but never raises.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to launch simulation: {0}")]
    Launch(#[from] std::io::Error),
}

/// Umbrella error for session-level commands (connect, start, stop).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
