//! Slot registry error types

/// Error type for slot allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// Every slot in the pool is occupied
    Full,
}

impl std::fmt::Display for SlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotError::Full => write!(f, "all agent slots are occupied"),
        }
    }
}

impl std::error::Error for SlotError {}
