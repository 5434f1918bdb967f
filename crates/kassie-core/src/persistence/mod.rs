//! Persistence manager and storage backends.
//!
//! The manager owns the active [`Backend`], the dirty queue and the flush
//! guard. Three backends are available:
//!
//! | Mode       | Layout                                        |
//! |------------|-----------------------------------------------|
//! | `snapshot` | one bincode file holding every live entity    |
//! | `files`    | one bincode file per entity, by group         |
//! | `document` | one JSON document per entity, by type         |
//!
//! Game code only sees `register_dirty`, `flush_*`, `load_group`,
//! `load_singleton` and `delete`.

pub mod documents;
pub mod files;
pub mod json;
pub mod keys;
pub mod snapshot;
pub mod store;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use kassie_logic::EntityId;

use crate::error::{ConfigError, PersistError, WorldError};
use crate::record::Record;
use crate::world::GameWorld;

pub use documents::DocumentBackend;
pub use files::FilesBackend;
pub use snapshot::{SnapshotBackend, SNAPSHOT_FILE};
pub use store::{DocId, DocumentStore, InMemoryDocumentStore, JsonDirStore};

/// Location that selects the in-memory document store.
pub const MEMORY_LOCATION: &str = "memory:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Snapshot,
    Files,
    Document,
}

impl StorageMode {
    pub fn name(self) -> &'static str {
        match self {
            StorageMode::Snapshot => "snapshot",
            StorageMode::Files => "files",
            StorageMode::Document => "document",
        }
    }
}

impl FromStr for StorageMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(StorageMode::Snapshot),
            "files" => Ok(StorageMode::Files),
            "document" => Ok(StorageMode::Document),
            _ => Err(ConfigError::UnknownStorageMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Counts of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    /// Skipped because identical to what was last written.
    pub unchanged: usize,
    pub deleted: usize,
    /// Rewritten in the second pass.
    pub retried: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Written(FlushReport),
    /// Another flush was running; nothing was done.
    Skipped,
}

/// A storage strategy.
pub trait Backend: Send {
    fn mode(&self) -> StorageMode;

    /// Loads everything stored into `world`. Returns the number of entities
    /// added.
    fn load(&mut self, world: &mut GameWorld) -> Result<usize, PersistError>;

    /// Writes `ids` (everything when `full`), purging entities whose
    /// `exists` flag was cleared.
    fn flush(&mut self, world: &mut GameWorld, ids: &[EntityId], full: bool) -> Result<FlushReport, PersistError>;

    /// Removes the stored form of `id`. A missing one is only a warning.
    fn delete(&mut self, world: &mut GameWorld, id: EntityId) -> Result<(), PersistError>;
}

/// One entity as read back from storage.
pub(crate) struct StoredEntity {
    pub id: EntityId,
    pub type_name: String,
    pub record: Record,
}

/// Rebuilds entities read from an id-keyed backend.
///
/// Every id is reserved before any record is attached, so references
/// between loaded entities, cycles included, resolve to the loaded
/// instances. Returns the number of entities restored.
pub(crate) fn restore(world: &mut GameWorld, entries: Vec<StoredEntity>) -> usize {
    let mut accepted = Vec::with_capacity(entries.len());
    for entry in entries {
        match world.reserve(entry.id, &entry.type_name) {
            Ok(_) => accepted.push(entry),
            Err(WorldError::SingletonExists(type_name)) => {
                log::warn!("more than one {type_name} stored, keeping the first");
            }
            Err(e) => log::warn!("skipping stored {} {}: {e}", entry.type_name, entry.id),
        }
    }

    let mut restored = 0;
    for mut entry in accepted {
        let dangling = |target: EntityId| !world.contains(target);
        let cleared = entry.record.clear_refs(&dangling);
        if cleared > 0 {
            log::warn!("{} {}: {cleared} dangling reference(s) cleared", entry.type_name, entry.id);
        }
        match world.attach_record(entry.id, &entry.record) {
            Ok(()) => restored += 1,
            Err(e) => {
                log::warn!("cannot restore {} {}: {e}", entry.type_name, entry.id);
                world.despawn(entry.id);
            }
        }
    }
    world.reindex();
    restored
}

/// Writes `bytes` to a temporary file, then renames it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Resets the flush flag when a flush ends, however it ends.
struct FlushGuard(Arc<AtomicBool>);

impl FlushGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard(Arc::clone(flag)))
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Persistence {
    backend: Option<Box<dyn Backend>>,
    /// Directory for side files (`clock.yml` and the like).
    root: Option<PathBuf>,
    dirty: Vec<EntityId>,
    dirty_set: HashSet<EntityId>,
    flushing: Arc<AtomicBool>,
}

impl Persistence {
    /// Persistence turned off: flushes do nothing, loads find nothing.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            root: None,
            dirty: Vec::new(),
            dirty_set: HashSet::new(),
            flushing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Selects the backend from its mode name. Unknown modes are a
    /// configuration error.
    pub fn configure(mode: &str, location: &str) -> Result<Self, PersistError> {
        let mode: StorageMode = mode.parse()?;
        Self::open(mode, location)
    }

    /// Opens the backend for `mode` at `location`, a directory, or
    /// [`MEMORY_LOCATION`] for an in-memory document store.
    pub fn open(mode: StorageMode, location: &str) -> Result<Self, PersistError> {
        if location == MEMORY_LOCATION {
            if mode != StorageMode::Document {
                return Err(ConfigError::NeedsDirectory(mode.name(), location.to_string()).into());
            }
            let backend = DocumentBackend::new(Box::new(InMemoryDocumentStore::new()));
            return Ok(Self::with_backend(Box::new(backend), None));
        }
        let root = PathBuf::from(location);
        let backend: Box<dyn Backend> = match mode {
            StorageMode::Snapshot => Box::new(SnapshotBackend::new(root.join(SNAPSHOT_FILE))),
            StorageMode::Files => Box::new(FilesBackend::new(&root)),
            StorageMode::Document => {
                let store = JsonDirStore::open(root.join("documents"))?;
                Box::new(DocumentBackend::new(Box::new(store)))
            }
        };
        log::info!("storage: {mode} at {}", root.display());
        Ok(Self::with_backend(backend, Some(root)))
    }

    pub fn with_backend(backend: Box<dyn Backend>, root: Option<PathBuf>) -> Self {
        Self {
            backend: Some(backend),
            root,
            ..Self::disabled()
        }
    }

    pub fn mode(&self) -> Option<StorageMode> {
        self.backend.as_ref().map(|b| b.mode())
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Shared flag that is set while a flush runs. Anything holding it can
    /// see, or hold off, flushes.
    pub fn flush_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flushing)
    }

    /// Loads everything stored into `world`.
    pub fn load(&mut self, world: &mut GameWorld) -> Result<usize, PersistError> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(0);
        };
        let loaded = backend.load(world)?;
        world.reindex();
        log::info!("loaded {loaded} entities ({} rooms)", world.room_count());
        Ok(loaded)
    }

    /// Queues `id` for the next dirty flush. Queuing twice is harmless.
    pub fn register_dirty(&mut self, id: EntityId) {
        if self.dirty_set.insert(id) {
            self.dirty.push(id);
        }
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Writes every entity. Skipped if a flush is already running.
    pub fn flush_all(&mut self, world: &mut GameWorld) -> Result<FlushOutcome, PersistError> {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            log::debug!("flush already running, skipping");
            return Ok(FlushOutcome::Skipped);
        };
        let Some(backend) = self.backend.as_mut() else {
            return Ok(FlushOutcome::Written(FlushReport::default()));
        };
        let report = backend.flush(world, &[], true)?;
        self.dirty.clear();
        self.dirty_set.clear();
        log::debug!("full flush: {report:?}");
        Ok(FlushOutcome::Written(report))
    }

    /// Writes the queued entities, in the order they were queued.
    pub fn flush_dirty(&mut self, world: &mut GameWorld) -> Result<FlushOutcome, PersistError> {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            log::debug!("flush already running, skipping");
            return Ok(FlushOutcome::Skipped);
        };
        let Some(backend) = self.backend.as_mut() else {
            self.dirty.clear();
            self.dirty_set.clear();
            return Ok(FlushOutcome::Written(FlushReport::default()));
        };
        let ids = std::mem::take(&mut self.dirty);
        self.dirty_set.clear();
        if ids.is_empty() {
            return Ok(FlushOutcome::Written(FlushReport::default()));
        }
        match backend.flush(world, &ids, false) {
            Ok(report) => Ok(FlushOutcome::Written(report)),
            Err(e) => {
                // Try again next time.
                for id in ids {
                    self.register_dirty(id);
                }
                Err(e)
            }
        }
    }

    /// Writes one entity right away.
    pub fn save(&mut self, world: &mut GameWorld, id: EntityId) -> Result<FlushOutcome, PersistError> {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            self.register_dirty(id);
            return Ok(FlushOutcome::Skipped);
        };
        let Some(backend) = self.backend.as_mut() else {
            return Ok(FlushOutcome::Written(FlushReport::default()));
        };
        backend.flush(world, &[id], false).map(FlushOutcome::Written)
    }

    /// Live entities of `group`, in a stable order.
    pub fn load_group(&self, world: &GameWorld, group: &str) -> Vec<EntityId> {
        world
            .ids_in_group(group)
            .into_iter()
            .filter(|id| world.is_live(*id))
            .collect()
    }

    /// The live instance of a singleton type, if any.
    pub fn load_singleton(&self, world: &GameWorld, type_name: &str) -> Option<EntityId> {
        let Some(entry) = world.registry().get(type_name) else {
            log::warn!("{type_name} is not a registered type");
            return None;
        };
        let found: Vec<EntityId> = world
            .ids_in_group(entry.group)
            .into_iter()
            .filter(|id| world.is_live(*id))
            .filter(|id| world.meta(*id).is_some_and(|m| m.type_name == type_name))
            .collect();
        if found.len() > 1 {
            log::warn!("{} instances of the singleton {type_name}, using the first", found.len());
        }
        found.first().copied()
    }

    /// Deletes an entity and its stored form.
    pub fn delete(&mut self, world: &mut GameWorld, id: EntityId) -> Result<(), PersistError> {
        world.mark_deleted(id)?;
        if let Some(backend) = self.backend.as_mut() {
            backend.delete(world, id)?;
        }
        world.despawn(id);
        self.dirty.retain(|d| *d != id);
        self.dirty_set.remove(&id);
        Ok(())
    }

    fn side_path(&self, name: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(format!("{name}.yml")))
    }

    /// Saves a small piece of state next to the world, as YAML.
    pub fn save_side_file<T: Serialize>(&self, name: &str, value: &T) -> Result<(), PersistError> {
        let Some(path) = self.side_path(name) else {
            return Ok(());
        };
        let text = serde_yaml::to_string(value)?;
        write_atomic(&path, text.as_bytes())
    }

    /// Reads a side file. `None` when persistence is off or the file does
    /// not exist yet.
    pub fn load_side_file<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, PersistError> {
        let Some(path) = self.side_path(name) else {
            return Ok(None);
        };
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(serde_yaml::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
