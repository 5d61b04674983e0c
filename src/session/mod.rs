//! Shared session state
//!
//! Per-slot ready flags and display names, plus the process-wide travel-mode
//! flag. Every mutation is followed by a snapshot broadcast, so the state
//! only ever changes under the hub lock and snapshots are consistent with a
//! moment at-or-after the event that caused them.

pub mod state;

pub use state::{SessionState, StateSnapshot, MAX_NAME_CODE_POINTS};
