//! Identifier types shared by event producers and consumers.

use serde::{Deserialize, Serialize};

/// Unique identifier for an event (ULID, sortable by creation time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub ulid::Ulid);

impl EventId {
    /// Generate a fresh event id.
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task identifiers are caller-supplied strings, unique per swarm run.
pub type TaskId = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_event_ids() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_display_event_id_as_ulid() {
        let id = EventId::new();
        assert_eq!(id.to_string().len(), 26);
    }
}
