//! Document store backend.
//!
//! Each type is a collection and each entity one document. References are
//! stored as `(collection, document id)`, so an entity can only reference
//! another once that one has been inserted. A flush therefore writes in two
//! passes: the first drops fields referencing entities without a document
//! yet and queues the entity for retry, the second rewrites the queued
//! entities once every target has a document.
//!
//! Loading goes through a `(collection, document) -> entity` cache. A new
//! entity is reserved and cached before its fields are decoded, and its
//! document waits in a queue, so cycles and long chains of references
//! resolve without recursion.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value as Json;

use kassie_logic::EntityId;

use super::json::{decode_record, encode_record};
use super::store::{DocId, DocumentStore};
use super::{Backend, FlushReport, StorageMode};
use crate::error::{PersistError, StoreError};
use crate::identity::{Kind, Meta};
use crate::world::GameWorld;

/// A document whose entity is reserved but not attached yet.
struct Pending {
    collection: String,
    doc: DocId,
    id: EntityId,
    document: Json,
}

/// Entities referring to a document that failed to load lose that
/// reference, the same way a missing document decodes.
fn clear_dangling(world: &mut GameWorld) {
    for id in world.all_ids() {
        let Some(mut record) = world.extract(id) else {
            continue;
        };
        let dangling = |target: EntityId| !world.contains(target);
        if record.clear_refs(&dangling) == 0 {
            continue;
        }
        if let Err(e) = world.attach_record(id, &record) {
            log::warn!("cannot clear dangling references of {id}: {e}");
        }
    }
}

pub struct DocumentBackend {
    store: Box<dyn DocumentStore>,
    cache: HashMap<(String, DocId), EntityId>,
    /// Last document written or loaded per entity. Unchanged entities are
    /// not written again.
    written: HashMap<EntityId, Json>,
    initial_load: bool,
}

impl DocumentBackend {
    pub fn new(store: Box<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            written: HashMap::new(),
            initial_load: true,
        }
    }

    /// When set (the default), documents read at load are remembered so
    /// the first flush after a restart skips entities nobody touched.
    pub fn with_initial_load(mut self, initial_load: bool) -> Self {
        self.initial_load = initial_load;
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// The entity a stored document is loaded as. A document seen for the
    /// first time gets an id and joins `pending`; its fields are decoded
    /// when the queue is drained, so a long chain of references never
    /// deepens the stack.
    fn resolve(
        &mut self,
        world: &mut GameWorld,
        collection: &str,
        doc: DocId,
        pending: &mut VecDeque<Pending>,
    ) -> Option<EntityId> {
        let key = (collection.to_string(), doc);
        if let Some(id) = self.cache.get(&key) {
            return Some(*id);
        }
        let document = match self.store.get(collection, doc) {
            Ok(Some(document)) => document,
            Ok(None) => {
                log::warn!("document {collection}/{doc} does not exist");
                return None;
            }
            Err(e) => {
                log::warn!("cannot read {collection}/{doc}: {e}");
                return None;
            }
        };

        let id = world.allocate_id();
        if let Err(e) = world.reserve(id, collection) {
            log::warn!("cannot load {collection}/{doc}: {e}");
            return None;
        }
        world.set_store_id(id, Some(doc));
        self.cache.insert(key, id);
        pending.push_back(Pending {
            collection: collection.to_string(),
            doc,
            id,
            document,
        });
        Some(id)
    }

    /// Decodes and attaches queued documents until none is left. Returns
    /// the entities that could not be attached; they are already despawned.
    fn drain(&mut self, world: &mut GameWorld, pending: &mut VecDeque<Pending>) -> Vec<EntityId> {
        let mut failed = Vec::new();
        while let Some(Pending {
            collection,
            doc,
            id,
            document,
        }) = pending.pop_front()
        {
            let decoded = {
                let mut resolve = |c: &str, d: DocId| self.resolve(world, c, d, pending);
                decode_record(&document, &mut resolve)
            };
            match decoded.and_then(|record| world.attach_record(id, &record)) {
                Ok(()) => {
                    if self.initial_load {
                        self.written.insert(id, document);
                    }
                }
                Err(e) => {
                    log::warn!("cannot load {collection}/{doc}: {e}");
                    self.cache.remove(&(collection, doc));
                    world.despawn(id);
                    failed.push(id);
                }
            }
        }
        failed
    }

    /// Writes one entity. On the first pass, fields referencing entities
    /// without a document are left out and the entity is queued in `retry`.
    fn write(
        &mut self,
        world: &mut GameWorld,
        id: EntityId,
        retry: Option<&mut Vec<EntityId>>,
        report: &mut FlushReport,
    ) -> Result<(), PersistError> {
        let Some(meta) = world.meta(id) else {
            return Ok(());
        };
        if !meta.exists {
            self.purge(world, &meta, report)?;
            return Ok(());
        }
        let Some(mut record) = world.extract(id) else {
            return Ok(());
        };
        if let Some(retry) = retry {
            let pending = |target: EntityId| world.is_live(target) && world.store_id(target).is_none();
            let dropped = record.drop_fields_referencing(pending);
            if !dropped.is_empty() {
                log::debug!("{id}: deferring {} until its targets are stored", dropped.join(", "));
                retry.push(id);
            }
        }

        let locate = |target: EntityId| {
            world
                .meta(target)
                .filter(|m| m.exists)
                .and_then(|m| m.store_id.map(|doc| (m.type_name.to_string(), doc)))
        };
        let document = encode_record(&record, &locate);

        if let Some(doc) = meta.store_id {
            if self.written.get(&id) == Some(&document) {
                report.unchanged += 1;
                return Ok(());
            }
            match self.store.update(meta.type_name, doc, document.clone()) {
                Ok(()) => {
                    self.written.insert(id, document);
                    report.written += 1;
                    return Ok(());
                }
                Err(StoreError::Missing { .. }) => {
                    log::warn!("document {}/{doc} of {id} vanished, inserting it again", meta.type_name);
                    self.cache.remove(&(meta.type_name.to_string(), doc));
                }
                Err(e) => return self.write_failed(&meta, e, report),
            }
        }

        match self.store.insert(meta.type_name, document.clone()) {
            Ok(doc) => {
                world.set_store_id(id, Some(doc));
                self.cache.insert((meta.type_name.to_string(), doc), id);
                self.written.insert(id, document);
                report.written += 1;
                Ok(())
            }
            Err(e) => self.write_failed(&meta, e, report),
        }
    }

    fn write_failed(&self, meta: &Meta, error: StoreError, report: &mut FlushReport) -> Result<(), PersistError> {
        if error.is_fatal() {
            log::error!("{} {} cannot be stored: {error}", meta.type_name, meta.id);
            return Err(error.into());
        }
        log::warn!("cannot store {} {}: {error}", meta.type_name, meta.id);
        report.failed += 1;
        Ok(())
    }

    /// Removes a deleted entity from the store and the world. Entities that
    /// never got a document are only dropped from the world.
    fn purge(&mut self, world: &mut GameWorld, meta: &Meta, report: &mut FlushReport) -> Result<(), PersistError> {
        if let Some(doc) = meta.store_id {
            match self.store.delete(meta.type_name, doc) {
                Ok(()) => report.deleted += 1,
                Err(StoreError::Missing { .. }) => {
                    log::warn!("document {}/{doc} was already gone", meta.type_name)
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => log::warn!("cannot delete {}/{doc}: {e}", meta.type_name),
            }
            self.cache.remove(&(meta.type_name.to_string(), doc));
        }
        self.written.remove(&meta.id);
        world.despawn(meta.id);
        Ok(())
    }
}

impl Backend for DocumentBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Document
    }

    fn load(&mut self, world: &mut GameWorld) -> Result<usize, PersistError> {
        let before = world.len();
        let mut failed = Vec::new();
        let types: Vec<(&'static str, Kind)> = world
            .registry()
            .iter()
            .map(|entry| (entry.type_name, entry.kind))
            .collect();
        for (type_name, kind) in types {
            let mut docs = match self.store.ids(type_name) {
                Ok(docs) => docs,
                Err(e) => {
                    log::warn!("cannot list {type_name}: {e}");
                    continue;
                }
            };
            if kind == Kind::Singleton && docs.len() > 1 {
                log::warn!("{} documents for the singleton {type_name}, using the first", docs.len());
                docs.truncate(1);
            }
            let mut pending = VecDeque::new();
            for doc in docs {
                self.resolve(world, type_name, doc, &mut pending);
                failed.extend(self.drain(world, &mut pending));
            }
        }
        if !failed.is_empty() {
            clear_dangling(world);
        }
        world.reindex();
        Ok(world.len().saturating_sub(before))
    }

    fn flush(&mut self, world: &mut GameWorld, ids: &[EntityId], full: bool) -> Result<FlushReport, PersistError> {
        let mut batch = if full { world.all_ids() } else { ids.to_vec() };

        // Live targets that have never been stored join the batch, so every
        // reference written by this flush can be resolved by its end.
        let mut queued: HashSet<EntityId> = batch.iter().copied().collect();
        let mut next = 0;
        while next < batch.len() {
            let id = batch[next];
            next += 1;
            let Some(record) = world.extract(id) else {
                continue;
            };
            for target in record.refs() {
                if world.is_live(target) && world.store_id(target).is_none() && queued.insert(target) {
                    batch.push(target);
                }
            }
        }

        let mut report = FlushReport::default();
        let mut retry = Vec::new();
        for id in batch {
            self.write(world, id, Some(&mut retry), &mut report)?;
        }
        report.retried = retry.len();
        for id in retry {
            self.write(world, id, None, &mut report)?;
        }
        Ok(report)
    }

    fn delete(&mut self, world: &mut GameWorld, id: EntityId) -> Result<(), PersistError> {
        let Some(meta) = world.meta(id) else {
            return Ok(());
        };
        let mut report = FlushReport::default();
        self.purge(world, &meta, &mut report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Item, Room};
    use crate::record::Persistent;
    use crate::persistence::store::{InMemoryDocumentStore, MAX_DOCUMENT_BYTES};
    use crate::persistence::Persistence;
    use serde_json::json;

    fn rope(holder: Option<EntityId>) -> Item {
        Item {
            prototype: "rope".to_string(),
            name: "a rope".to_string(),
            weight: 1.0,
            holder,
        }
    }

    #[test]
    fn test_rejected_document_is_fatal() {
        let mut world = GameWorld::new();
        let mut item = rope(None);
        item.name = "x".repeat(MAX_DOCUMENT_BYTES + 1);
        world.spawn(item).unwrap();

        let mut persistence = Persistence::configure("document", "memory:").unwrap();
        let err = persistence.flush_all(&mut world).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, PersistError::Store(StoreError::Rejected { .. })));
    }

    #[test]
    fn test_deferred_fields_are_written_on_the_second_pass() {
        let mut world = GameWorld::new();
        let a = world.create_room("deck", "a", None).unwrap();
        let b = world.create_room("deck", "b", None).unwrap();
        world.link_rooms(a, kassie_logic::Direction::East, b).unwrap();

        let mut backend = DocumentBackend::new(Box::new(InMemoryDocumentStore::new()));
        let report = backend.flush(&mut world, &[], true).unwrap();
        assert_eq!(report.failed, 0);
        assert!(report.retried > 0);

        let doc = world.store_id(a).unwrap();
        let stored = backend.store().get(Room::TYPE_NAME, doc).unwrap().unwrap();
        let target = world.store_id(b).unwrap();
        let reference = format!("{{\"$ref\":[\"{}\",{}]}}", Room::TYPE_NAME, target.0);
        assert!(stored.to_string().contains(&reference), "{stored}");
    }

    #[test]
    fn test_purge_removes_the_document() {
        let mut world = GameWorld::new();
        let item = world.spawn(rope(None)).unwrap();
        let mut backend = DocumentBackend::new(Box::new(InMemoryDocumentStore::new()));
        backend.flush(&mut world, &[], true).unwrap();
        let doc = world.store_id(item).unwrap();

        world.mark_deleted(item).unwrap();
        let report = backend.flush(&mut world, &[], true).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(!world.contains(item));
        assert!(backend.store().get(Item::TYPE_NAME, doc).unwrap().is_none());
    }

    #[test]
    fn test_unloadable_target_leaves_no_dangling_reference() {
        let mut store = InMemoryDocumentStore::new();
        let broken = store.insert(Item::TYPE_NAME, json!({"name": "no prototype"})).unwrap();
        store
            .insert(
                Item::TYPE_NAME,
                json!({"prototype": "rope", "holder": {"$ref": [Item::TYPE_NAME, broken.0]}}),
            )
            .unwrap();

        let mut backend = DocumentBackend::new(Box::new(store));
        let mut world = GameWorld::new();
        assert_eq!(backend.load(&mut world).unwrap(), 1);
        let id = world.ids_of::<Item>()[0];
        let item = world.get::<Item>(id).unwrap();
        assert_eq!(item.prototype, "rope");
        assert_eq!(item.holder, None);
    }
}
