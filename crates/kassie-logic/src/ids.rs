//! Durable entity identity.

use serde::{Deserialize, Serialize};

/// Process-unique identity of a persistable entity.
///
/// Ids are handed out by a monotonic allocator and never reused within a
/// process lifetime, so an id held across a deletion can never alias a
/// newer entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_raw_value() {
        let mut ids = vec![EntityId(7), EntityId(2), EntityId(11)];
        ids.sort();
        assert_eq!(ids, vec![EntityId(2), EntityId(7), EntityId(11)]);
        assert_eq!(EntityId(7).to_string(), "#7");
    }
}
