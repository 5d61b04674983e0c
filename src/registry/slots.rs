//! Fixed-pool slot allocation

use super::error::SlotError;
use super::SlotId;

/// Number of identity slots the hub manages
pub const MAX_SLOTS: u8 = 8;

/// Fixed pool of agent identity slots
///
/// Slots are numbered `1..=MAX_SLOTS`. Allocation always returns the
/// lowest-numbered free slot; release is idempotent.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    occupied: [bool; MAX_SLOTS as usize],
}

impl SlotRegistry {
    /// Create a registry with every slot free
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lowest-numbered free slot
    pub fn acquire(&mut self) -> Result<SlotId, SlotError> {
        for (index, taken) in self.occupied.iter_mut().enumerate() {
            if !*taken {
                *taken = true;
                return Ok(index as SlotId + 1);
            }
        }
        Err(SlotError::Full)
    }

    /// Release a slot, making it reassignable
    ///
    /// Releasing a free or out-of-range slot is a no-op.
    pub fn release(&mut self, slot: SlotId) {
        if let Some(index) = self.slot_index(slot) {
            self.occupied[index] = false;
        }
    }

    /// Whether the given slot is currently occupied
    pub fn is_occupied(&self, slot: SlotId) -> bool {
        self.slot_index(slot)
            .map(|i| self.occupied[i])
            .unwrap_or(false)
    }

    /// Currently occupied slot ids in ascending order
    pub fn occupied(&self) -> Vec<SlotId> {
        self.occupied
            .iter()
            .enumerate()
            .filter(|(_, taken)| **taken)
            .map(|(index, _)| index as SlotId + 1)
            .collect()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.occupied.iter().filter(|taken| **taken).count()
    }

    /// Whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_index(&self, slot: SlotId) -> Option<usize> {
        (1..=MAX_SLOTS).contains(&slot).then(|| slot as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_lowest_free() {
        let mut registry = SlotRegistry::new();

        assert_eq!(registry.acquire(), Ok(1));
        assert_eq!(registry.acquire(), Ok(2));
        assert_eq!(registry.acquire(), Ok(3));
    }

    #[test]
    fn test_full_pool() {
        let mut registry = SlotRegistry::new();
        for _ in 0..MAX_SLOTS {
            registry.acquire().unwrap();
        }

        assert_eq!(registry.acquire(), Err(SlotError::Full));
        assert_eq!(registry.len(), MAX_SLOTS as usize);
    }

    #[test]
    fn test_release_reassigns_lowest() {
        let mut registry = SlotRegistry::new();
        registry.acquire().unwrap(); // 1
        registry.acquire().unwrap(); // 2
        registry.acquire().unwrap(); // 3

        registry.release(2);
        assert_eq!(registry.acquire(), Ok(2));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut registry = SlotRegistry::new();
        registry.acquire().unwrap();

        registry.release(1);
        registry.release(1);
        registry.release(99); // out of range, ignored

        assert!(registry.is_empty());
        assert_eq!(registry.acquire(), Ok(1));
    }

    #[test]
    fn test_single_client_reconnect_gets_slot_one() {
        let mut registry = SlotRegistry::new();

        for _ in 0..3 {
            let slot = registry.acquire().unwrap();
            assert_eq!(slot, 1);
            registry.release(slot);
        }
    }

    #[test]
    fn test_occupied_ascending() {
        let mut registry = SlotRegistry::new();
        registry.acquire().unwrap(); // 1
        registry.acquire().unwrap(); // 2
        registry.acquire().unwrap(); // 3
        registry.release(2);

        assert_eq!(registry.occupied(), vec![1, 3]);
    }
}
