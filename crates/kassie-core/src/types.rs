//! Registry of persistable types.
//!
//! Backends never name concrete component types. They go through the
//! type-erased extract/attach functions registered here, looked up by the
//! qualified type name stored next to each record.

use std::collections::HashMap;

use hecs::{Entity, World};

use crate::error::RecordError;
use crate::identity::Kind;
use crate::record::{Persistent, Record};

pub type ExtractFn = fn(&World, Entity) -> Option<Record>;
pub type AttachFn = fn(&mut World, Entity, &Record) -> Result<(), RecordError>;

fn extract_fn<T: Persistent>(world: &World, entity: Entity) -> Option<Record> {
    world.get::<&T>(entity).ok().map(|c| c.to_record())
}

fn attach_fn<T: Persistent>(world: &mut World, entity: Entity, record: &Record) -> Result<(), RecordError> {
    let component = T::from_record(record)?;
    world
        .insert_one(entity, component)
        .map_err(|_| RecordError::Invalid {
            field: T::TYPE_NAME.to_string(),
            reason: "entity vanished while loading".to_string(),
        })
}

/// How to store and restore one type.
#[derive(Clone, Copy)]
pub struct TypeEntry {
    pub type_name: &'static str,
    pub group: &'static str,
    pub kind: Kind,
    pub extract: ExtractFn,
    pub attach: AttachFn,
}

#[derive(Clone, Default)]
pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
    by_name: HashMap<&'static str, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`. Registration order is load order.
    pub fn register<T: Persistent>(&mut self) {
        if self.by_name.contains_key(T::TYPE_NAME) {
            return;
        }
        self.by_name.insert(T::TYPE_NAME, self.entries.len());
        self.entries.push(TypeEntry {
            type_name: T::TYPE_NAME,
            group: T::GROUP,
            kind: T::KIND,
            extract: extract_fn::<T>,
            attach: attach_fn::<T>,
        });
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeEntry> {
        self.by_name.get(type_name).map(|i| &self.entries[*i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
