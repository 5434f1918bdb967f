//! Document stores: collections of JSON objects addressed by a
//! store-assigned id.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::StoreError;

/// Largest document a store accepts, encoded.
pub const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

/// Store-assigned document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CRUD access to document collections.
pub trait DocumentStore: Send {
    /// Stores a new document and returns its id.
    fn insert(&mut self, collection: &str, document: Json) -> Result<DocId, StoreError>;

    /// Replaces an existing document.
    fn update(&mut self, collection: &str, id: DocId, document: Json) -> Result<(), StoreError>;

    fn delete(&mut self, collection: &str, id: DocId) -> Result<(), StoreError>;

    fn get(&self, collection: &str, id: DocId) -> Result<Option<Json>, StoreError>;

    /// Ids of a collection, in insertion order.
    fn ids(&self, collection: &str) -> Result<Vec<DocId>, StoreError>;

    fn collections(&self) -> Result<Vec<String>, StoreError>;
}

/// Rejects documents no store would accept.
fn validate(collection: &str, document: &Json) -> Result<(), StoreError> {
    if !document.is_object() {
        return Err(StoreError::Rejected {
            collection: collection.to_string(),
            reason: "a document must be an object".to_string(),
        });
    }
    let size = serde_json::to_vec(document)?.len();
    if size > MAX_DOCUMENT_BYTES {
        return Err(StoreError::Rejected {
            collection: collection.to_string(),
            reason: format!("document is {size} bytes, the limit is {MAX_DOCUMENT_BYTES}"),
        });
    }
    Ok(())
}

fn missing(collection: &str, id: DocId) -> StoreError {
    StoreError::Missing {
        collection: collection.to_string(),
        id: id.0,
    }
}

/// Store kept in memory, for tests and throwaway worlds.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    collections: BTreeMap<String, BTreeMap<DocId, Json>>,
    next: u64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert(&mut self, collection: &str, document: Json) -> Result<DocId, StoreError> {
        validate(collection, &document)?;
        self.next += 1;
        let id = DocId(self.next);
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, document);
        Ok(id)
    }

    fn update(&mut self, collection: &str, id: DocId, document: Json) -> Result<(), StoreError> {
        validate(collection, &document)?;
        let slot = self
            .collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(&id))
            .ok_or_else(|| missing(collection, id))?;
        *slot = document;
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: DocId) -> Result<(), StoreError> {
        self.collections
            .get_mut(collection)
            .and_then(|c| c.remove(&id))
            .map(|_| ())
            .ok_or_else(|| missing(collection, id))
    }

    fn get(&self, collection: &str, id: DocId) -> Result<Option<Json>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.get(&id))
            .cloned())
    }

    fn ids(&self, collection: &str) -> Result<Vec<DocId>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.keys().copied().collect())
            .unwrap_or_default())
    }

    fn collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collections.keys().cloned().collect())
    }
}

/// Store writing one JSON file per document under
/// `<root>/<collection>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
    next: u64,
}

const COUNTER_FILE: &str = "next_id";

impl JsonDirStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let next = match fs::read_to_string(root.join(COUNTER_FILE)) {
            Ok(text) => text.trim().parse().unwrap_or(0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let mut store = Self { root, next };
        // Never hand out an id already on disk, even if the counter is stale.
        for collection in store.collections()? {
            if let Some(highest) = store.ids(&collection)?.last() {
                store.next = store.next.max(highest.0);
            }
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, collection: &str, id: DocId) -> PathBuf {
        self.root.join(collection).join(format!("{}.json", id.0))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl DocumentStore for JsonDirStore {
    fn insert(&mut self, collection: &str, document: Json) -> Result<DocId, StoreError> {
        validate(collection, &document)?;
        let id = DocId(self.next + 1);
        let bytes = serde_json::to_vec_pretty(&document)?;
        Self::write_atomic(&self.path_of(collection, id), &bytes)?;
        self.next = id.0;
        Self::write_atomic(&self.root.join(COUNTER_FILE), self.next.to_string().as_bytes())?;
        Ok(id)
    }

    fn update(&mut self, collection: &str, id: DocId, document: Json) -> Result<(), StoreError> {
        validate(collection, &document)?;
        let path = self.path_of(collection, id);
        if !path.exists() {
            return Err(missing(collection, id));
        }
        let bytes = serde_json::to_vec_pretty(&document)?;
        Self::write_atomic(&path, &bytes)
    }

    fn delete(&mut self, collection: &str, id: DocId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_of(collection, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(missing(collection, id)),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, collection: &str, id: DocId) -> Result<Option<Json>, StoreError> {
        match fs::read(self.path_of(collection, id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn ids(&self, collection: &str) -> Result<Vec<DocId>, StoreError> {
        let dir = self.root.join(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            {
                ids.push(DocId(id));
            }
        }
        // Ids are sequential, so numeric order is insertion order.
        ids.sort();
        Ok(ids)
    }

    fn collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(store: &mut dyn DocumentStore) {
        let a = store.insert("room.Room", json!({"title": "quay"})).unwrap();
        let b = store.insert("room.Room", json!({"title": "pier"})).unwrap();
        assert!(b > a);
        assert_eq!(store.ids("room.Room").unwrap(), vec![a, b]);

        store.update("room.Room", a, json!({"title": "old quay"})).unwrap();
        assert_eq!(
            store.get("room.Room", a).unwrap(),
            Some(json!({"title": "old quay"}))
        );

        store.delete("room.Room", b).unwrap();
        assert!(matches!(
            store.delete("room.Room", b),
            Err(StoreError::Missing { .. })
        ));
        assert_eq!(store.get("room.Room", b).unwrap(), None);
        assert_eq!(store.collections().unwrap(), vec!["room.Room".to_string()]);

        let err = store.insert("room.Room", json!([1, 2])).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_in_memory_store() {
        exercise(&mut InMemoryDocumentStore::new());
    }

    #[test]
    fn test_json_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&mut JsonDirStore::open(dir.path()).unwrap());

        // Reopening never reuses an id.
        let mut reopened = JsonDirStore::open(dir.path()).unwrap();
        let c = reopened.insert("room.Room", json!({})).unwrap();
        assert_eq!(c, DocId(3));
    }

    #[test]
    fn test_oversized_document_rejected() {
        let mut store = InMemoryDocumentStore::new();
        let big = "x".repeat(MAX_DOCUMENT_BYTES + 1);
        let err = store.insert("object.Item", json!({ "blob": big })).unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert!(store.is_empty());
    }
}
