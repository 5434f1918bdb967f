//! The live world: an ECS holding every persistable entity, with the
//! id index and the room indexes kept alongside.
//!
//! Every persistable entity carries a [`Meta`] component plus exactly one
//! registered component. Other entities refer to it by [`EntityId`], never
//! by `hecs::Entity`, so references stay valid across save and load.

use std::collections::HashMap;

use hecs::{Entity, World};

use kassie_logic::pathfinding::RoomGraph;
use kassie_logic::{Coords, Direction, EntityId, Exit};

use crate::components::{
    register_all, valid_mnemonic, valid_zone, Character, Door, ExitSlot, Room,
};
use crate::error::{RecordError, WorldError};
use crate::identity::{IdAllocator, Kind, Meta};
use crate::persistence::store::DocId;
use crate::record::{Persistent, Record};
use crate::types::TypeRegistry;

pub struct GameWorld {
    pub ecs: World,
    index: HashMap<EntityId, Entity>,
    ids: IdAllocator,
    registry: TypeRegistry,
    rooms_by_key: HashMap<(String, String), EntityId>,
    rooms_by_coords: HashMap<Coords, EntityId>,
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl GameWorld {
    pub fn new() -> Self {
        let mut registry = TypeRegistry::new();
        register_all(&mut registry);
        Self {
            ecs: World::new(),
            index: HashMap::new(),
            ids: IdAllocator::new(),
            registry,
            rooms_by_key: HashMap::new(),
            rooms_by_coords: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Number of entities, deleted ones awaiting purge included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.index.get(&id).copied()
    }

    // ── Entity lifecycle ──────────────────────────────────────────────

    /// Adds a new entity with a fresh id. Rooms go through
    /// [`GameWorld::add_room`], which checks and indexes their key.
    pub fn spawn<T: Persistent>(&mut self, value: T) -> Result<EntityId, WorldError> {
        if T::TYPE_NAME == Room::TYPE_NAME {
            return Err(WorldError::UncheckedRoom);
        }
        self.insert(value)
    }

    fn insert<T: Persistent>(&mut self, value: T) -> Result<EntityId, WorldError> {
        if T::KIND == Kind::Singleton && self.singleton_id(T::TYPE_NAME).is_some() {
            return Err(WorldError::SingletonExists(T::TYPE_NAME));
        }
        let id = self.ids.allocate();
        let meta = Meta {
            id,
            type_name: T::TYPE_NAME,
            group: T::GROUP,
            kind: T::KIND,
            exists: true,
            store_id: None,
        };
        let entity = self.ecs.spawn((meta, value));
        self.index.insert(id, entity);
        Ok(id)
    }

    pub(crate) fn allocate_id(&mut self) -> EntityId {
        self.ids.allocate()
    }

    /// Creates a blank entity of a registered type under a known id. The
    /// component is attached later with [`GameWorld::attach_record`], which
    /// lets loaders register every id before resolving any reference.
    pub(crate) fn reserve(&mut self, id: EntityId, type_name: &str) -> Result<Entity, WorldError> {
        let entry = *self
            .registry
            .get(type_name)
            .ok_or_else(|| WorldError::UnknownType(type_name.to_string()))?;
        if self.index.contains_key(&id) {
            return Err(WorldError::IdInUse(id));
        }
        if entry.kind == Kind::Singleton && self.singleton_id(entry.type_name).is_some() {
            return Err(WorldError::SingletonExists(entry.type_name));
        }
        self.ids.reserve(id);
        let meta = Meta {
            id,
            type_name: entry.type_name,
            group: entry.group,
            kind: entry.kind,
            exists: true,
            store_id: None,
        };
        let entity = self.ecs.spawn((meta,));
        self.index.insert(id, entity);
        Ok(entity)
    }

    pub(crate) fn attach_record(&mut self, id: EntityId, record: &Record) -> Result<(), RecordError> {
        let invalid = |reason: &str| RecordError::Invalid {
            field: id.to_string(),
            reason: reason.to_string(),
        };
        let entity = self.entity(id).ok_or_else(|| invalid("not reserved"))?;
        let type_name = self
            .ecs
            .get::<&Meta>(entity)
            .map(|m| m.type_name)
            .map_err(|_| invalid("no metadata"))?;
        let entry = *self
            .registry
            .get(type_name)
            .ok_or_else(|| invalid("unregistered type"))?;
        (entry.attach)(&mut self.ecs, entity, record)
    }

    /// The record of `id`'s component.
    pub fn extract(&self, id: EntityId) -> Option<Record> {
        let entity = self.entity(id)?;
        let type_name = self.ecs.get::<&Meta>(entity).ok()?.type_name;
        let entry = self.registry.get(type_name)?;
        (entry.extract)(&self.ecs, entity)
    }

    /// Marks `id` as no longer existing. Storage is purged at next flush.
    pub fn mark_deleted(&mut self, id: EntityId) -> Result<(), WorldError> {
        let entity = self.entity(id).ok_or(WorldError::UnknownEntity(id))?;
        let mut meta = self
            .ecs
            .get::<&mut Meta>(entity)
            .map_err(|_| WorldError::UnknownEntity(id))?;
        meta.exists = false;
        Ok(())
    }

    /// Physically removes `id`.
    pub fn despawn(&mut self, id: EntityId) {
        if let Some(entity) = self.index.remove(&id) {
            self.rooms_by_key.retain(|_, r| *r != id);
            self.rooms_by_coords.retain(|_, r| *r != id);
            if self.ecs.despawn(entity).is_err() {
                log::debug!("entity {id} was indexed but already gone from the ECS");
            }
        }
    }

    /// Removes everything. Ids already handed out stay reserved.
    pub fn clear(&mut self) {
        self.ecs.clear();
        self.index.clear();
        self.rooms_by_key.clear();
        self.rooms_by_coords.clear();
    }

    // ── Lookups ───────────────────────────────────────────────────────

    pub fn meta(&self, id: EntityId) -> Option<Meta> {
        let entity = self.entity(id)?;
        self.ecs.get::<&Meta>(entity).ok().map(|m| (*m).clone())
    }

    pub fn is_live(&self, id: EntityId) -> bool {
        self.meta(id).is_some_and(|m| m.exists)
    }

    pub fn store_id(&self, id: EntityId) -> Option<DocId> {
        self.meta(id).and_then(|m| m.store_id)
    }

    pub(crate) fn set_store_id(&mut self, id: EntityId, store_id: Option<DocId>) {
        if let Some(entity) = self.entity(id) {
            if let Ok(mut meta) = self.ecs.get::<&mut Meta>(entity) {
                meta.store_id = store_id;
            }
        }
    }

    pub fn get<T: Persistent>(&self, id: EntityId) -> Option<hecs::Ref<'_, T>> {
        self.ecs.get::<&T>(self.entity(id)?).ok()
    }

    pub fn get_mut<T: Persistent>(&self, id: EntityId) -> Option<hecs::RefMut<'_, T>> {
        self.ecs.get::<&mut T>(self.entity(id)?).ok()
    }

    /// Ids of every `T`, sorted.
    pub fn ids_of<T: Persistent>(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .ecs
            .query::<(&Meta, &T)>()
            .iter()
            .map(|(_, (meta, _))| meta.id)
            .collect();
        ids.sort();
        ids
    }

    /// Ids of every entity in `group`, sorted.
    pub fn ids_in_group(&self, group: &str) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .ecs
            .query::<&Meta>()
            .iter()
            .filter(|(_, meta)| meta.group == group)
            .map(|(_, meta)| meta.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn singleton_id(&self, type_name: &str) -> Option<EntityId> {
        self.ecs
            .query::<&Meta>()
            .iter()
            .find(|(_, meta)| meta.kind == Kind::Singleton && meta.type_name == type_name)
            .map(|(_, meta)| meta.id)
    }

    pub fn singleton<T: Persistent>(&self) -> Option<hecs::Ref<'_, T>> {
        self.get(self.singleton_id(T::TYPE_NAME)?)
    }

    /// Every id, sorted.
    pub fn all_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.index.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Ids of entities whose `exists` flag is set, sorted.
    pub fn live_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .ecs
            .query::<&Meta>()
            .iter()
            .filter(|(_, meta)| meta.exists)
            .map(|(_, meta)| meta.id)
            .collect();
        ids.sort();
        ids
    }

    // ── Rooms ─────────────────────────────────────────────────────────

    /// Creates a room, refusing an invalid or already used key.
    pub fn create_room(
        &mut self,
        zone: &str,
        mnemonic: &str,
        coords: Option<Coords>,
    ) -> Result<EntityId, WorldError> {
        let mut room = Room::new(zone.to_lowercase(), mnemonic.to_lowercase());
        room.coords = coords;
        self.add_room(room)
    }

    /// Adds a fully built room, refusing an invalid or already used key.
    pub fn add_room(&mut self, room: Room) -> Result<EntityId, WorldError> {
        self.check_room_key(&room.zone, &room.mnemonic)?;
        let key = (room.zone.clone(), room.mnemonic.clone());
        let coords = room.coords;
        let id = self.insert(room)?;
        self.rooms_by_key.insert(key, id);
        if let Some(at) = coords {
            self.index_coords(id, at);
        }
        Ok(id)
    }

    fn check_room_key(&self, zone: &str, mnemonic: &str) -> Result<(), WorldError> {
        if !valid_zone(zone) {
            return Err(WorldError::InvalidZone(zone.to_string()));
        }
        if !valid_mnemonic(mnemonic) {
            return Err(WorldError::InvalidMnemonic(mnemonic.to_string()));
        }
        if self
            .rooms_by_key
            .contains_key(&(zone.to_string(), mnemonic.to_string()))
        {
            return Err(WorldError::DuplicateRoom {
                zone: zone.to_string(),
                mnemonic: mnemonic.to_string(),
            });
        }
        Ok(())
    }

    fn index_coords(&mut self, id: EntityId, at: Coords) {
        if let Some(previous) = self.rooms_by_coords.insert(at, id) {
            if previous != id {
                log::debug!("room {id} now stands at {at}, where {previous} stood");
            }
        }
    }

    pub fn room_by_key(&self, zone: &str, mnemonic: &str) -> Option<EntityId> {
        self.rooms_by_key
            .get(&(zone.to_string(), mnemonic.to_string()))
            .copied()
    }

    /// Changes a room's key, keeping the key unique.
    pub fn rename_room(&mut self, id: EntityId, zone: &str, mnemonic: &str) -> Result<(), WorldError> {
        let (zone, mnemonic) = (zone.to_lowercase(), mnemonic.to_lowercase());
        let old_key = {
            let room = self.get::<Room>(id).ok_or(WorldError::WrongType {
                id,
                expected: Room::TYPE_NAME,
            })?;
            (room.zone.clone(), room.mnemonic.clone())
        };
        if old_key == (zone.clone(), mnemonic.clone()) {
            return Ok(());
        }
        self.check_room_key(&zone, &mnemonic)?;
        if let Some(mut room) = self.get_mut::<Room>(id) {
            room.zone = zone.clone();
            room.mnemonic = mnemonic.clone();
        }
        self.rooms_by_key.remove(&old_key);
        self.rooms_by_key.insert((zone, mnemonic), id);
        Ok(())
    }

    /// Moves a room to new coordinates (or none).
    pub fn set_room_coords(&mut self, id: EntityId, coords: Option<Coords>) -> Result<(), WorldError> {
        let old = {
            let mut room = self.get_mut::<Room>(id).ok_or(WorldError::WrongType {
                id,
                expected: Room::TYPE_NAME,
            })?;
            std::mem::replace(&mut room.coords, coords)
        };
        if let Some(at) = old {
            if self.rooms_by_coords.get(&at) == Some(&id) {
                self.rooms_by_coords.remove(&at);
            }
        }
        if let Some(at) = coords {
            self.index_coords(id, at);
        }
        Ok(())
    }

    fn require_room(&self, id: EntityId) -> Result<(), WorldError> {
        if self.get::<Room>(id).is_some() {
            Ok(())
        } else if self.contains(id) {
            Err(WorldError::WrongType {
                id,
                expected: Room::TYPE_NAME,
            })
        } else {
            Err(WorldError::UnknownEntity(id))
        }
    }

    /// Adds a one-way exit.
    pub fn add_exit(&mut self, from: EntityId, direction: Direction, to: EntityId) -> Result<(), WorldError> {
        self.require_room(from)?;
        self.require_room(to)?;
        if let Some(mut room) = self.get_mut::<Room>(from) {
            room.exits.insert(direction, ExitSlot::new(direction, to));
        }
        Ok(())
    }

    /// Adds an exit and the reciprocal one.
    pub fn link_rooms(&mut self, a: EntityId, direction: Direction, b: EntityId) -> Result<(), WorldError> {
        self.add_exit(a, direction, b)?;
        self.add_exit(b, direction.opposite(), a)
    }

    pub fn set_door(&mut self, room: EntityId, direction: Direction, door: Option<Door>) -> Result<(), WorldError> {
        self.require_room(room)?;
        if let Some(mut r) = self.get_mut::<Room>(room) {
            if let Some(slot) = r.exits.get_mut(&direction) {
                slot.door = door;
            }
        }
        Ok(())
    }

    /// Moves a character into `room`, keeping both sides of the reference
    /// in sync.
    pub fn place_character(&mut self, character: EntityId, room: EntityId) -> Result<(), WorldError> {
        self.require_room(room)?;
        let previous = {
            let mut c = self.get_mut::<Character>(character).ok_or(WorldError::WrongType {
                id: character,
                expected: Character::TYPE_NAME,
            })?;
            c.room.replace(room)
        };
        if let Some(old) = previous {
            if let Some(mut r) = self.get_mut::<Room>(old) {
                r.characters.retain(|c| *c != character);
            }
        }
        if let Some(mut r) = self.get_mut::<Room>(room) {
            if !r.characters.contains(&character) {
                r.characters.push(character);
            }
        }
        Ok(())
    }

    /// Queues `message` on every character present in `room`, except
    /// `except`.
    pub fn send_to_room(&mut self, room: EntityId, message: &str, except: Option<EntityId>) {
        let present = match self.get::<Room>(room) {
            Some(r) => r.characters.clone(),
            None => return,
        };
        for id in present.into_iter().filter(|c| Some(*c) != except) {
            if let Some(mut c) = self.get_mut::<Character>(id) {
                c.send(message);
            }
        }
    }

    /// Rebuilds the room indexes from the room components. Called after a
    /// load; a duplicate key keeps the lowest id and the other rooms are
    /// marked deleted, so the next flush purges them.
    pub fn reindex(&mut self) {
        self.rooms_by_key.clear();
        self.rooms_by_coords.clear();
        let mut rooms: Vec<(EntityId, String, String, Option<Coords>)> = self
            .ecs
            .query::<(&Meta, &Room)>()
            .iter()
            .filter(|(_, (meta, _))| meta.exists)
            .map(|(_, (meta, room))| (meta.id, room.zone.clone(), room.mnemonic.clone(), room.coords))
            .collect();
        rooms.sort_by_key(|r| r.0);
        for (id, zone, mnemonic, coords) in rooms {
            if let Some(existing) = self.rooms_by_key.get(&(zone.clone(), mnemonic.clone())) {
                log::warn!("room {zone}:{mnemonic} is both {existing} and {id}, deleting {id}");
                if let Err(e) = self.mark_deleted(id) {
                    log::warn!("cannot delete duplicate room {id}: {e}");
                }
                continue;
            }
            self.rooms_by_key.insert((zone, mnemonic), id);
            if let Some(at) = coords {
                self.index_coords(id, at);
            }
        }
        let highest = self.index.keys().max().copied();
        if let Some(id) = highest {
            self.ids.reserve(id);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms_by_key.len()
    }
}

impl RoomGraph for GameWorld {
    fn exits(&self, room: EntityId) -> Vec<Exit> {
        let Some(r) = self.get::<Room>(room) else {
            return Vec::new();
        };
        r.exits
            .iter()
            .filter(|(_, slot)| self.is_live(slot.destination))
            .map(|(direction, slot)| Exit {
                origin: room,
                destination: slot.destination,
                direction: *direction,
                length: slot.length,
                hidden: slot.hidden,
                locked: slot.is_locked(),
                synthetic: false,
            })
            .collect()
    }

    fn coords(&self, room: EntityId) -> Option<Coords> {
        self.get::<Room>(room).and_then(|r| r.coords)
    }

    fn accepts_discontinuous(&self, room: EntityId) -> bool {
        self.get::<Room>(room)
            .is_some_and(|r| r.expanse.is_some() || r.ship.is_some())
    }

    fn room_at(&self, coords: Coords) -> Option<EntityId> {
        self.rooms_by_coords.get(&coords).copied()
    }
}
