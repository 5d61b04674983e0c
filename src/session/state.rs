//! Per-slot ready/name state and snapshot production

use std::collections::HashMap;

use crate::protocol::message::{NameMap, ReadyMap};
use crate::registry::{SlotId, MAX_SLOTS};

/// Display names are capped at this many code points after trimming
pub const MAX_NAME_CODE_POINTS: usize = 32;

/// State for one attached agent
#[derive(Debug, Default)]
struct AgentEntry {
    ready: bool,
    name: String,
}

/// Shared ready/name/travel state for every attached agent
///
/// An entry exists for a slot iff that slot is occupied. Snapshots fill the
/// full `1..=MAX_SLOTS` range with `false` / `""` for unoccupied slots.
#[derive(Debug, Default)]
pub struct SessionState {
    agents: HashMap<SlotId, AgentEntry>,
    travel_mode: bool,
}

/// Canonical state snapshot: two mappings produced together, always covering
/// the full slot range.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub agents: ReadyMap,
    pub names: NameMap,
}

impl SessionState {
    /// Create an empty state (no agents, travel mode off)
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot with `ready=false` and an empty name
    pub fn attach(&mut self, slot: SlotId) {
        self.agents.insert(slot, AgentEntry::default());
    }

    /// Remove a slot's state entirely
    pub fn detach(&mut self, slot: SlotId) {
        self.agents.remove(&slot);
    }

    /// Whether the slot has an attached agent
    pub fn contains(&self, slot: SlotId) -> bool {
        self.agents.contains_key(&slot)
    }

    /// Set the ready flag for an attached slot
    pub fn set_ready(&mut self, slot: SlotId, ready: bool) {
        if let Some(entry) = self.agents.get_mut(&slot) {
            entry.ready = ready;
        }
    }

    /// Set the display name for an attached slot
    ///
    /// The name is trimmed and truncated to [`MAX_NAME_CODE_POINTS`] code
    /// points before storing.
    pub fn set_name(&mut self, slot: SlotId, name: &str) {
        if let Some(entry) = self.agents.get_mut(&slot) {
            entry.name = name.trim().chars().take(MAX_NAME_CODE_POINTS).collect();
        }
    }

    /// Display name for a slot, empty if absent
    pub fn name(&self, slot: SlotId) -> &str {
        self.agents.get(&slot).map(|e| e.name.as_str()).unwrap_or("")
    }

    /// Clear every attached slot's ready flag
    pub fn reset_all_ready(&mut self) {
        for entry in self.agents.values_mut() {
            entry.ready = false;
        }
    }

    /// Whether travel mode is active
    pub fn travel_mode(&self) -> bool {
        self.travel_mode
    }

    /// Toggle the process-wide travel-mode flag
    pub fn set_travel_mode(&mut self, active: bool) {
        self.travel_mode = active;
    }

    /// True iff at least one slot is occupied and every occupied slot is ready
    pub fn all_ready(&self) -> bool {
        !self.agents.is_empty() && self.agents.values().all(|entry| entry.ready)
    }

    /// Number of attached agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is attached
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Produce the canonical full-range snapshot
    pub fn snapshot(&self) -> StateSnapshot {
        let mut agents = ReadyMap::new();
        let mut names = NameMap::new();

        for slot in 1..=MAX_SLOTS {
            let entry = self.agents.get(&slot);
            agents.insert(slot, entry.map(|e| e.ready).unwrap_or(false));
            names.insert(slot, entry.map(|e| e.name.clone()).unwrap_or_default());
        }

        StateSnapshot { agents, names }
    }
}
