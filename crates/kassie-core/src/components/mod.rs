//! Component definitions for the world.
//!
//! Components are pure data structs attached to entities, each with its
//! record conversion. Behaviour lives in the world and the systems.

mod character;
mod navigation;
mod permission;
mod room;

pub use character::*;
pub use navigation::*;
pub use permission::*;
pub use room::*;

pub use kassie_logic::expanse::Expanse;

use crate::types::TypeRegistry;

/// Registers every persistable component, in load order.
pub fn register_all(registry: &mut TypeRegistry) {
    registry.register::<PermissionGroups>();
    registry.register::<Account>();
    registry.register::<Expanse>();
    registry.register::<Room>();
    registry.register::<Character>();
    registry.register::<Item>();
    registry.register::<ShipModel>();
    registry.register::<Ship>();
}
