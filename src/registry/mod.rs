//! Slot registry for agent identities
//!
//! The hub owns a fixed pool of eight identity slots. A connecting peer
//! acquires the lowest-numbered free slot and holds it for the lifetime of
//! its connection; the slot is reclaimed on disconnect and becomes
//! reassignable immediately.
//!
//! Lowest-free allocation is deliberate: reconnecting clients see a stable
//! id whenever possible, and clients can rely on id ordering for display.

pub mod error;
pub mod slots;

pub use error::SlotError;
pub use slots::{SlotRegistry, MAX_SLOTS};

/// Agent identity in `1..=MAX_SLOTS`
pub type SlotId = u8;
