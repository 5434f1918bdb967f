//! The ten fixed exit directions.

use serde::{Deserialize, Serialize};

use crate::vector::Vec3;

/// Compass and vertical directions an exit can point to.
///
/// Declaration order is the canonical slot order of a room's exits and the
/// order in which path searches examine them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    South,
    SouthWest,
    West,
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    Down,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::Down,
        Direction::Up,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Direction::South => "south",
            Direction::SouthWest => "southwest",
            Direction::West => "west",
            Direction::NorthWest => "northwest",
            Direction::North => "north",
            Direction::NorthEast => "northeast",
            Direction::East => "east",
            Direction::SouthEast => "southeast",
            Direction::Down => "down",
            Direction::Up => "up",
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::South => Direction::North,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
        }
    }

    /// Unit grid offset (x east, y north, z up).
    pub fn offset(&self) -> (i32, i32, i32) {
        match self {
            Direction::South => (0, -1, 0),
            Direction::SouthWest => (-1, -1, 0),
            Direction::West => (-1, 0, 0),
            Direction::NorthWest => (-1, 1, 0),
            Direction::North => (0, 1, 0),
            Direction::NorthEast => (1, 1, 0),
            Direction::East => (1, 0, 0),
            Direction::SouthEast => (1, -1, 0),
            Direction::Down => (0, 0, -1),
            Direction::Up => (0, 0, 1),
        }
    }

    /// Closest direction to a vector. Vertical wins when the vector climbs or
    /// dives more than it travels horizontally.
    pub fn from_vector(v: Vec3) -> Direction {
        let horizontal = v.x.hypot(v.y);
        if v.z.abs() > horizontal {
            return if v.z > 0.0 {
                Direction::Up
            } else {
                Direction::Down
            };
        }

        let sector = (v.direction() / 45.0).round() as i64 % 8;
        match sector {
            0 => Direction::East,
            1 => Direction::NorthEast,
            2 => Direction::North,
            3 => Direction::NorthWest,
            4 => Direction::West,
            5 => Direction::SouthWest,
            6 => Direction::South,
            _ => Direction::SouthEast,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0:?} is not an exit direction")]
pub struct UnknownDirection(pub String);

impl std::str::FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase().replace('-', "");
        Direction::ALL
            .iter()
            .copied()
            .find(|d| d.name() == lowered)
            .ok_or_else(|| UnknownDirection(s.to_string()))
    }
}
