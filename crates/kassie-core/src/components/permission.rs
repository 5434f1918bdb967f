//! Permission groups, the process-wide singleton.

use std::collections::BTreeMap;

use kassie_logic::EntityId;

use crate::error::RecordError;
use crate::identity::Kind;
use crate::record::{Persistent, Record};

/// Named permission groups and which character belongs to which.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionGroups {
    /// Group name to the groups it inherits from.
    pub groups: BTreeMap<String, Vec<String>>,
    /// Character to group name.
    pub members: BTreeMap<EntityId, String>,
}

impl PermissionGroups {
    /// The stock groups: everyone is a player, builders are players,
    /// administrators are builders.
    pub fn standard() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert("player".to_string(), Vec::new());
        groups.insert("builder".to_string(), vec!["player".to_string()]);
        groups.insert("administrator".to_string(), vec!["builder".to_string()]);
        Self {
            groups,
            members: BTreeMap::new(),
        }
    }

    pub fn group_of(&self, character: EntityId) -> &str {
        self.members
            .get(&character)
            .map(String::as_str)
            .unwrap_or("player")
    }

    /// True when `character` is in `group` or in a group inheriting it.
    pub fn is_in(&self, character: EntityId, group: &str) -> bool {
        let mut pending = vec![self.group_of(character).to_string()];
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            if current == group {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            if let Some(parents) = self.groups.get(&current) {
                pending.extend(parents.iter().cloned());
            }
            seen.push(current);
        }
        false
    }
}

impl Persistent for PermissionGroups {
    const TYPE_NAME: &'static str = "permission.PermissionGroups";
    const GROUP: &'static str = "permissions";
    const KIND: Kind = Kind::Singleton;

    fn to_record(&self) -> Record {
        Record::new()
            .with("groups", self.groups.clone())
            .with("members", self.members.clone())
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            groups: record.or_default("groups")?,
            members: record.or_default("members")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inheritance() {
        let mut perms = PermissionGroups::standard();
        perms.members.insert(EntityId(5), "administrator".to_string());
        assert!(perms.is_in(EntityId(5), "player"));
        assert!(perms.is_in(EntityId(5), "builder"));
        assert!(!perms.is_in(EntityId(6), "builder"));

        let back = PermissionGroups::from_record(&perms.to_record()).unwrap();
        assert_eq!(back, perms);
    }
}
