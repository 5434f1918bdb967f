//! Exits, paths and path sets.
//!
//! A [`Path`] is an ordered, contiguous sequence of exits: every exit leaves
//! the room the previous one arrived in. The only way to grow a path is
//! [`Path::push`], which refuses a non-contiguous exit, so the invariant holds
//! for every path that exists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::direction::Direction;
use crate::ids::EntityId;
use crate::pathfinding::PathError;

/// A directed edge between two rooms, as seen by the path finder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub origin: EntityId,
    pub destination: EntityId,
    pub direction: Direction,
    /// Traversal cost.
    pub length: f64,
    pub hidden: bool,
    /// A locked door blocks passable-only searches.
    pub locked: bool,
    /// Synthesised from coordinates rather than backed by a real exit.
    pub synthetic: bool,
}

impl Exit {
    pub fn new(origin: EntityId, direction: Direction, destination: EntityId) -> Self {
        Self {
            origin,
            destination,
            direction,
            length: 1.0,
            hidden: false,
            locked: false,
            synthetic: false,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }
}

/// Ordered exit sequence between two rooms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    exits: Vec<Exit>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(exit: Exit) -> Self {
        Self { exits: vec![exit] }
    }

    pub fn exits(&self) -> &[Exit] {
        &self.exits
    }

    pub fn len(&self) -> usize {
        self.exits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exits.is_empty()
    }

    /// Room the first exit leaves from.
    pub fn origin(&self) -> Option<EntityId> {
        self.exits.first().map(|e| e.origin)
    }

    /// Room the last exit leads to.
    pub fn destination(&self) -> Option<EntityId> {
        self.exits.last().map(|e| e.destination)
    }

    /// True when no exit was synthesised.
    pub fn is_continuous(&self) -> bool {
        self.exits.iter().all(|e| !e.synthetic)
    }

    /// Sum of exit lengths.
    pub fn length(&self) -> f64 {
        self.exits.iter().map(|e| e.length).sum()
    }

    pub fn directions(&self) -> Vec<Direction> {
        self.exits.iter().map(|e| e.direction).collect()
    }

    pub fn is_contiguous(&self) -> bool {
        self.exits
            .windows(2)
            .all(|pair| pair[0].destination == pair[1].origin)
    }

    /// Appends an exit, refusing one that does not leave the current
    /// destination.
    pub fn push(&mut self, exit: Exit) -> Result<(), PathError> {
        if let Some(last) = self.destination() {
            if last != exit.origin {
                return Err(PathError::Broken {
                    at: last,
                    next: exit.origin,
                });
            }
        }
        self.exits.push(exit);
        Ok(())
    }

    pub fn extend(&mut self, other: &Path) -> Result<(), PathError> {
        for exit in &other.exits {
            self.push(exit.clone())?;
        }
        Ok(())
    }

    /// Collapses redundant hops.
    ///
    /// Loops (the path coming back to a room it already went through) are
    /// cut out, then consecutive synthetic exits going the same way are
    /// merged into one. Both operations keep the path contiguous and keep its
    /// endpoints.
    pub fn shorten(&mut self) {
        let mut kept: Vec<Exit> = Vec::with_capacity(self.exits.len());
        // room -> number of kept exits when the path stands in that room
        let mut positions: HashMap<EntityId, usize> = HashMap::new();
        if let Some(origin) = self.origin() {
            positions.insert(origin, 0);
        }

        for exit in self.exits.drain(..) {
            match positions.get(&exit.destination).copied() {
                Some(at) => {
                    kept.truncate(at);
                    positions.retain(|_, pos| *pos <= at);
                }
                None => {
                    kept.push(exit);
                    let dest = kept[kept.len() - 1].destination;
                    positions.insert(dest, kept.len());
                }
            }
        }

        let mut merged: Vec<Exit> = Vec::with_capacity(kept.len());
        for exit in kept {
            if let Some(last) = merged.last_mut() {
                if last.synthetic && exit.synthetic && last.direction == exit.direction {
                    last.destination = exit.destination;
                    last.length += exit.length;
                    continue;
                }
            }
            merged.push(exit);
        }
        self.exits = merged;
    }
}

/// Paths from one origin, at most one per destination.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: Vec<Path>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, destination: EntityId) -> Option<&Path> {
        self.paths
            .iter()
            .find(|p| p.destination() == Some(destination))
    }

    pub fn contains(&self, destination: EntityId) -> bool {
        self.get(destination).is_some()
    }

    /// Stores `path` unless a path to the same destination with no more hops
    /// is already known. A strictly shorter path replaces the old one; on a
    /// tie the first one found stays.
    pub fn offer(&mut self, path: Path) -> bool {
        let Some(destination) = path.destination() else {
            return false;
        };
        match self
            .paths
            .iter()
            .position(|p| p.destination() == Some(destination))
        {
            Some(index) if self.paths[index].len() > path.len() => {
                self.paths.remove(index);
                self.paths.push(path);
                true
            }
            Some(_) => false,
            None => {
                self.paths.push(path);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }

    pub fn destinations(&self) -> Vec<EntityId> {
        self.paths.iter().filter_map(|p| p.destination()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit(from: u64, dir: Direction, to: u64) -> Exit {
        Exit::new(EntityId(from), dir, EntityId(to))
    }

    #[test]
    fn test_push_refuses_broken_sequence() {
        let mut path = Path::new();
        path.push(exit(1, Direction::East, 2)).unwrap();
        let err = path.push(exit(3, Direction::East, 4)).unwrap_err();
        assert!(matches!(err, PathError::Broken { .. }));
        assert_eq!(path.len(), 1);
        assert_eq!(path.origin(), Some(EntityId(1)));
        assert_eq!(path.destination(), Some(EntityId(2)));
    }

    #[test]
    fn test_shorten_cuts_loops() {
        let mut path = Path::new();
        path.push(exit(1, Direction::East, 2)).unwrap();
        path.push(exit(2, Direction::North, 3)).unwrap();
        path.push(exit(3, Direction::South, 2)).unwrap();
        path.push(exit(2, Direction::East, 4)).unwrap();

        path.shorten();
        assert_eq!(path.directions(), vec![Direction::East, Direction::East]);
        assert!(path.is_contiguous());
        assert_eq!(path.origin(), Some(EntityId(1)));
        assert_eq!(path.destination(), Some(EntityId(4)));
    }

    #[test]
    fn test_shorten_merges_synthetic_hops() {
        let mut a = exit(1, Direction::East, 2);
        a.synthetic = true;
        let mut b = exit(2, Direction::East, 3);
        b.synthetic = true;
        b.length = 2.0;
        let mut path = Path::new();
        path.push(a).unwrap();
        path.push(b).unwrap();
        path.push(exit(3, Direction::North, 4)).unwrap();

        path.shorten();
        assert_eq!(path.len(), 2);
        assert_eq!(path.exits()[0].destination, EntityId(3));
        assert!((path.exits()[0].length - 3.0).abs() < 1e-9);
        assert!(!path.is_continuous());
        assert!(path.is_contiguous());
    }

    #[test]
    fn test_path_set_keeps_shortest() {
        let mut set = PathSet::new();
        let mut long = Path::new();
        long.push(exit(1, Direction::North, 2)).unwrap();
        long.push(exit(2, Direction::East, 3)).unwrap();
        assert!(set.offer(long));

        let mut tie = Path::new();
        tie.push(exit(1, Direction::East, 5)).unwrap();
        tie.push(exit(5, Direction::North, 3)).unwrap();
        assert!(!set.offer(tie));
        assert_eq!(set.get(EntityId(3)).unwrap().exits()[0].direction, Direction::North);

        assert!(set.offer(Path::single(exit(1, Direction::NorthEast, 3))));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(EntityId(3)).unwrap().len(), 1);
    }
}
