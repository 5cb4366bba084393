//! Control side of the loop: the cross-process bridge, the drain-and-publish
//! consumer, the process lifecycle manager, and the per-channel session.

pub mod bridge;
pub mod lifecycle;
pub mod publisher;
pub mod session;
