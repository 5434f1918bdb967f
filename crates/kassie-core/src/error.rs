//! Error types of the world engine.

use std::path::PathBuf;

use kassie_logic::EntityId;

/// A record could not be turned back into a component.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    Missing(String),
    #[error("field `{field}` should be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("field `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

/// A world graph operation was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("the room {zone}:{mnemonic} already exists")]
    DuplicateRoom { zone: String, mnemonic: String },
    #[error("invalid zone name {0:?}")]
    InvalidZone(String),
    #[error("invalid room mnemonic {0:?}")]
    InvalidMnemonic(String),
    #[error("no entity {0}")]
    UnknownEntity(EntityId),
    #[error("entity {id} is not a {expected}")]
    WrongType { id: EntityId, expected: &'static str },
    #[error("a {0} already exists")]
    SingletonExists(&'static str),
    #[error("entity {0} is already in use")]
    IdInUse(EntityId),
    #[error("unknown type {0:?}")]
    UnknownType(String),
    #[error("rooms are added with add_room, which checks their key")]
    UncheckedRoom,
}

/// Failure of a document store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document {collection}/{id} not found")]
    Missing { collection: String, id: u64 },
    #[error("document rejected in {collection}: {reason}")]
    Rejected { collection: String, reason: String },
}

impl StoreError {
    /// Rejections stop the process; everything else only affects one
    /// document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Rejected { .. })
    }
}

/// Failure of the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binary encoding error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PersistError {
    pub fn is_fatal(&self) -> bool {
        match self {
            PersistError::Store(e) => e.is_fatal(),
            PersistError::Config(_) => true,
            _ => false,
        }
    }
}

/// Invalid configuration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown storage mode {0:?} (expected snapshot, files or document)")]
    UnknownStorageMode(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0} storage needs a directory, not {1:?}")]
    NeedsDirectory(&'static str, String),
}

/// A deferred ship action could not run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error("{0} is not aboard a ship")]
    NotAboard(EntityId),
    #[error("there is no sail here")]
    NoSail,
    #[error("the sail is already hoisted")]
    AlreadyHoisted,
    #[error("the sail is already folded")]
    AlreadyFolded,
    #[error(transparent)]
    World(#[from] WorldError),
}
