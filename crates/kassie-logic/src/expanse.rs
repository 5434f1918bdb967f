//! Expanses: open-water regions with point obstacles, coasts and winds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;
use crate::sailing::{resultant_wind, Wind};
use crate::vector::Vec3;

/// An open-water region at a fixed altitude.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expanse {
    pub key: String,
    pub altitude: i32,
    /// Obstacle name (reef, rock, wreck) by (x, y).
    pub obstacles: BTreeMap<(i32, i32), String>,
    /// Coastal room by (x, y).
    pub coasts: BTreeMap<(i32, i32), EntityId>,
    pub winds: Vec<Wind>,
}

impl Expanse {
    pub fn new(key: impl Into<String>, altitude: i32) -> Self {
        Self {
            key: key.into(),
            altitude,
            ..Self::default()
        }
    }

    pub fn add_obstacle(&mut self, x: i32, y: i32, name: impl Into<String>) {
        self.obstacles.insert((x, y), name.into());
    }

    pub fn add_coast(&mut self, x: i32, y: i32, room: EntityId) {
        self.coasts.insert((x, y), room);
    }

    pub fn is_coast(&self, room: EntityId) -> bool {
        self.coasts.values().any(|r| *r == room)
    }

    /// Everything a ship can run into: obstacles and coasts, at the
    /// expanse's altitude.
    pub fn points(&self) -> Vec<Vec3> {
        let z = self.altitude as f64;
        self.obstacles
            .keys()
            .chain(self.coasts.keys())
            .map(|(x, y)| Vec3::new(*x as f64, *y as f64, z))
            .collect()
    }

    pub fn wind_at(&self, position: Vec3) -> Vec3 {
        resultant_wind(position, &self.winds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_at_altitude() {
        let mut expanse = Expanse::new("bay", 2);
        expanse.add_obstacle(3, 4, "reef");
        expanse.add_coast(0, 1, EntityId(9));
        let points = expanse.points();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.z == 2.0));
        assert!(expanse.is_coast(EntityId(9)));
        assert!(!expanse.is_coast(EntityId(3)));
    }

    #[test]
    fn test_calm_expanse_has_no_wind() {
        let expanse = Expanse::new("pond", 0);
        assert!(expanse.wind_at(Vec3::ZERO).is_zero());
    }
}
