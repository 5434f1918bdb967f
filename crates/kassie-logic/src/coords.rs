//! Integer room coordinates.

use serde::{Deserialize, Serialize};

use crate::direction::Direction;

/// Integer coordinates of a room. Rooms without valid coordinates carry no
/// `Coords` at all and are only reachable through the exit graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coords {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coords {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn tuple(&self) -> (i32, i32, i32) {
        (self.x, self.y, self.z)
    }

    pub fn distance(&self, other: &Coords) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Neighbouring coordinates one step in `direction`.
    pub fn step(&self, direction: Direction) -> Coords {
        let (dx, dy, dz) = direction.offset();
        Coords::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl std::ops::Add for Coords {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Coords::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::fmt::Display for Coords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.x, self.y, self.z)
    }
}
