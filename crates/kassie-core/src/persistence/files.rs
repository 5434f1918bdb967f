//! One file per entity, under `<root>/<group>/<key>.sav`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use kassie_logic::EntityId;

use super::{restore, write_atomic, Backend, FlushReport, StorageMode, StoredEntity};
use crate::error::PersistError;
use crate::identity::Meta;
use crate::record::Record;
use crate::world::GameWorld;

#[derive(Serialize, Deserialize)]
struct FileEntry {
    type_name: String,
    id: EntityId,
    record: Record,
}

pub struct FilesBackend {
    root: PathBuf,
}

impl FilesBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, meta: &Meta) -> PathBuf {
        let key = meta.storage_key();
        self.root.join(key.group()).join(key.file_name())
    }

    fn remove(&self, meta: &Meta) -> bool {
        let path = self.path_of(meta);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("{} was already gone", path.display());
                false
            }
            Err(e) => {
                log::warn!("cannot remove {}: {e}", path.display());
                false
            }
        }
    }

    fn read_group(&self, group: &str) -> Vec<StoredEntity> {
        let dir = self.root.join(group);
        let mut paths: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("sav"))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                log::warn!("cannot list {}: {e}", dir.display());
                return Vec::new();
            }
        };
        paths.sort();
        paths.iter().filter_map(|p| read_entry(p)).collect()
    }
}

fn read_entry(path: &Path) -> Option<StoredEntity> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("cannot read {}: {e}", path.display());
            return None;
        }
    };
    match bincode::deserialize::<FileEntry>(&bytes) {
        Ok(entry) => Some(StoredEntity {
            id: entry.id,
            type_name: entry.type_name,
            record: entry.record,
        }),
        Err(e) => {
            log::warn!("{} is corrupt: {e}", path.display());
            None
        }
    }
}

impl Backend for FilesBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Files
    }

    fn load(&mut self, world: &mut GameWorld) -> Result<usize, PersistError> {
        let mut seen = BTreeSet::new();
        let groups: Vec<&'static str> = world
            .registry()
            .iter()
            .map(|entry| entry.group)
            .filter(|group| seen.insert(*group))
            .collect();
        let entries: Vec<StoredEntity> = groups.iter().flat_map(|g| self.read_group(g)).collect();
        Ok(restore(world, entries))
    }

    fn flush(&mut self, world: &mut GameWorld, ids: &[EntityId], full: bool) -> Result<FlushReport, PersistError> {
        let ids = if full { world.all_ids() } else { ids.to_vec() };
        let mut report = FlushReport::default();
        for id in ids {
            let Some(meta) = world.meta(id) else {
                continue;
            };
            if !meta.exists {
                if self.remove(&meta) {
                    report.deleted += 1;
                }
                world.despawn(id);
                continue;
            }
            let Some(record) = world.extract(id) else {
                continue;
            };
            let entry = FileEntry {
                type_name: meta.type_name.to_string(),
                id,
                record,
            };
            let path = self.path_of(&meta);
            let written = bincode::serialize(&entry)
                .map_err(PersistError::from)
                .and_then(|bytes| write_atomic(&path, &bytes));
            match written {
                Ok(()) => report.written += 1,
                Err(e) => {
                    log::warn!("cannot save {}: {e}", path.display());
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn delete(&mut self, world: &mut GameWorld, id: EntityId) -> Result<(), PersistError> {
        if let Some(meta) = world.meta(id) {
            self.remove(&meta);
        }
        Ok(())
    }
}
