//! # mindbridge
//!
//! Streams a biosignal (attention/meditation level) from a headset into one
//! of two real-time simulations (a lane-racing game and a growth garden)
//! through a shared-memory control bridge.
//!
//! ## Pipeline
//! sensor → acquisition worker (thread, driver sample rate) → sample queue
//! → drain-and-publish consumer (100 ms timer) → control bridge (shared
//! atomic cell) → simulation process (60 Hz tick loop) → rendered frame.
//!
//! ## Guarantees
//! - Queue: single-producer/single-consumer FIFO, drained to empty each tick.
//! - Bridge: last-writer-wins, non-blocking both sides, at most 100 ms of
//!   staleness between sample arrival and control propagation.
//! - Lifecycle: idempotent start/stop, two-phase shutdown (graceful signal,
//!   bounded wait, forced kill), bridge reset to neutral before the kill.
//! - Simulations: hysteresis dead-band between lower/upper thresholds keeps
//!   sensor jitter from oscillating the controlled quantity.

pub mod acquisition;
pub mod control;
pub mod error;
pub mod sim;
pub mod utils;

pub use acquisition::driver::{validate_signal_kind, SignalKind, SignalSource};
pub use acquisition::queue::SampleQueue;
pub use control::bridge::{ControlBridge, NEUTRAL_CONTROL_VALUE};
pub use control::session::{ChannelSession, SessionRegistry};
pub use error::{BridgeError, DriverError, LifecycleError, SessionError};
pub use sim::SimKind;
