//! Entity identity: kinds, id allocation, per-entity metadata.

use kassie_logic::EntityId;

use crate::persistence::store::DocId;

/// How instances of a persistable type are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Many instances per group, each with its own numeric id.
    Identified,
    /// Exactly one live instance, known by its type name.
    Singleton,
}

/// Monotonic id source. An id is never handed out twice in a process
/// lifetime, deleted entities included.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Makes sure `id` will never be allocated.
    pub fn reserve(&mut self, id: EntityId) {
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
    }

    pub fn peek(&self) -> EntityId {
        EntityId(self.next)
    }
}

/// Where an entity lives in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Identified { group: &'static str, id: EntityId },
    Singleton {
        group: &'static str,
        type_name: &'static str,
    },
}

impl StorageKey {
    pub fn group(&self) -> &'static str {
        match self {
            StorageKey::Identified { group, .. } | StorageKey::Singleton { group, .. } => group,
        }
    }

    /// File name of the entity inside its group directory.
    pub fn file_name(&self) -> String {
        match self {
            StorageKey::Identified { id, .. } => format!("{}.sav", id.raw()),
            StorageKey::Singleton { type_name, .. } => {
                let short = type_name.rsplit('.').next().unwrap_or(type_name);
                format!("{short}.sav")
            }
        }
    }
}

/// Identity and storage bookkeeping attached to every persistable entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    pub id: EntityId,
    pub type_name: &'static str,
    pub group: &'static str,
    pub kind: Kind,
    /// Cleared by logical deletion; the entity is purged at the next flush.
    pub exists: bool,
    /// Id assigned by the document store on first insert.
    pub store_id: Option<DocId>,
}

impl Meta {
    pub fn storage_key(&self) -> StorageKey {
        match self.kind {
            Kind::Identified => StorageKey::Identified {
                group: self.group,
                id: self.id,
            },
            Kind::Singleton => StorageKey::Singleton {
                group: self.group,
                type_name: self.type_name,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_never_reuses() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_ne!(a, b);
        ids.reserve(EntityId(40));
        assert_eq!(ids.allocate(), EntityId(41));
        ids.reserve(EntityId(3));
        assert_eq!(ids.allocate(), EntityId(42));
    }

    #[test]
    fn test_storage_file_names() {
        let room = Meta {
            id: EntityId(12),
            type_name: "room.Room",
            group: "rooms",
            kind: Kind::Identified,
            exists: true,
            store_id: None,
        };
        assert_eq!(room.storage_key().file_name(), "12.sav");

        let groups = Meta {
            kind: Kind::Singleton,
            type_name: "permission.PermissionGroups",
            group: "permissions",
            ..room
        };
        assert_eq!(groups.storage_key().file_name(), "PermissionGroups.sav");
        assert_eq!(groups.storage_key().group(), "permissions");
    }
}
