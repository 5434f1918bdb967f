//! Whole-world binary snapshot.
//!
//! Every live entity is written as one bincode blob. References are stored
//! as entity ids, so shared references come back shared.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use kassie_logic::EntityId;

use super::{restore, write_atomic, Backend, FlushReport, StorageMode, StoredEntity};
use crate::error::PersistError;
use crate::record::Record;
use crate::world::GameWorld;

/// Version number of the snapshot format (increment when it changes)
const SNAPSHOT_VERSION: u32 = 1;

pub const SNAPSHOT_FILE: &str = "world.sav";

#[derive(Serialize, Deserialize)]
struct SnapshotData {
    version: u32,
    entities: Vec<SnapshotEntity>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntity {
    id: EntityId,
    type_name: String,
    record: Record,
}

pub struct SnapshotBackend {
    path: PathBuf,
}

impl SnapshotBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<SnapshotData>, PersistError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let data: SnapshotData = bincode::deserialize(&bytes)?;
        if data.version != SNAPSHOT_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: data.version,
            });
        }
        Ok(Some(data))
    }
}

impl Backend for SnapshotBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Snapshot
    }

    fn load(&mut self, world: &mut GameWorld) -> Result<usize, PersistError> {
        let data = match self.read() {
            Ok(Some(data)) => data,
            Ok(None) => {
                log::info!("no snapshot at {}, starting empty", self.path.display());
                return Ok(0);
            }
            Err(e) => {
                log::warn!("cannot read snapshot {}: {e}; starting empty", self.path.display());
                return Ok(0);
            }
        };
        let entries = data
            .entities
            .into_iter()
            .map(|e| StoredEntity {
                id: e.id,
                type_name: e.type_name,
                record: e.record,
            })
            .collect();
        Ok(restore(world, entries))
    }

    /// Always writes the whole world; `ids` only matter to other backends.
    fn flush(&mut self, world: &mut GameWorld, _ids: &[EntityId], _full: bool) -> Result<FlushReport, PersistError> {
        let mut report = FlushReport::default();
        let mut entities = Vec::new();
        for id in world.live_ids() {
            let (Some(meta), Some(record)) = (world.meta(id), world.extract(id)) else {
                continue;
            };
            entities.push(SnapshotEntity {
                id,
                type_name: meta.type_name.to_string(),
                record,
            });
        }
        report.written = entities.len();

        // Encode fully before touching the file, so a failure leaves the
        // previous snapshot in place.
        let data = SnapshotData {
            version: SNAPSHOT_VERSION,
            entities,
        };
        let bytes = bincode::serialize(&data)?;
        write_atomic(&self.path, &bytes)?;

        for id in world.all_ids() {
            if !world.is_live(id) {
                world.despawn(id);
                report.deleted += 1;
            }
        }
        Ok(report)
    }

    /// Nothing to remove: the next snapshot simply omits the entity.
    fn delete(&mut self, _world: &mut GameWorld, _id: EntityId) -> Result<(), PersistError> {
        Ok(())
    }
}
