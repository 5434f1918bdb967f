//! Pure world logic for Kassie.
//!
//! This crate contains the logic that is independent of any storage, engine
//! or runtime: the room graph path finder and ship physics. Functions take
//! plain data and return results, making them unit-testable and usable from
//! the live world in `kassie-core` as well as from standalone tools.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`collision`] | Swept collision against point obstacles, impact tiers |
//! | [`constants`] | Allure thresholds, sail angles, speed tiers |
//! | [`coords`] | Integer room coordinates |
//! | [`direction`] | The ten exit directions |
//! | [`expanse`] | Open-water regions: obstacles, coasts, winds |
//! | [`ids`] | Durable entity ids |
//! | [`path`] | Exits, contiguous paths, path sets |
//! | [`pathfinding`] | Absolute and relative path search over a [`pathfinding::RoomGraph`] |
//! | [`sailing`] | Allures, sails, rudder, oars, wind composition |
//! | [`vector`] | 3D vectors in degrees-based headings |
//! | [`vehicle`] | Kinematics and ship forces |
//! | [`vessel`] | A ship as a rigid body of rooms |

pub mod collision;
pub mod constants;
pub mod coords;
pub mod direction;
pub mod expanse;
pub mod ids;
pub mod path;
pub mod pathfinding;
pub mod sailing;
pub mod vector;
pub mod vehicle;
pub mod vessel;

pub use coords::Coords;
pub use direction::Direction;
pub use ids::EntityId;
pub use path::{Exit, Path, PathSet};
pub use vector::Vec3;
