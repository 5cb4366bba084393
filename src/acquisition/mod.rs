//! Acquisition side of the biofeedback loop: driver contract, the shared
//! sample queue, and the per-connection worker thread.

pub mod driver;
pub mod queue;
pub mod worker;
