//! Cross-cutting helpers: the lock-free pipeline event trace.

pub mod events;
