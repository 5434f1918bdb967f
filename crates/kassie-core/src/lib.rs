//! Kassie Core - MUD World Engine
//!
//! An ECS-based world of rooms, characters, items and ships, saved through
//! one of three interchangeable persistence backends.
//!
//! # Architecture
//!
//! The world lives in a `hecs` ECS wrapped by [`world::GameWorld`]:
//! - **Entities**: rooms, characters, accounts, items, ships, expanses
//! - **Components**: pure data with a record conversion ([`record::Persistent`])
//! - **Systems**: logic that operates on the world (ship navigation)
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`components`] | Persistable component types and their registration |
//! | [`config`] | YAML server configuration |
//! | [`engine`] | Tick loop owning the world, persistence and scheduler |
//! | [`error`] | Error types |
//! | [`generation`] | Seeded demo world |
//! | [`identity`] | Kinds, id allocation, entity metadata |
//! | [`persistence`] | Snapshot, files and document backends |
//! | [`record`] | Field-keyed records and dynamic values |
//! | [`scheduler`] | Delay-based task queue |
//! | [`systems`] | Navigation and sail handling |
//! | [`types`] | Type registry used by the backends |
//! | [`world`] | The live world, room index, room graph |
//!
//! # Example
//!
//! ```rust,no_run
//! use kassie_core::prelude::*;
//!
//! let mut engine = Engine::new(ServerConfig::default()).unwrap();
//! engine.start().unwrap();
//! loop {
//!     engine.update(1.0).unwrap();
//! }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod identity;
pub mod persistence;
pub mod record;
pub mod scheduler;
pub mod systems;
pub mod types;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::ServerConfig;
    pub use crate::engine::Engine;
    pub use crate::error::{PersistError, WorldError};
    pub use crate::persistence::{FlushOutcome, Persistence, StorageMode};
    pub use crate::record::{Persistent, Record, Value};
    pub use crate::world::GameWorld;
    pub use kassie_logic::{Coords, Direction, EntityId, Vec3};
}
