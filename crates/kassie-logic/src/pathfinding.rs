//! Path finding over the room graph.
//!
//! The finder is a pure computation over whatever implements [`RoomGraph`]:
//! the live world in `kassie-core`, or the standalone [`MapGraph`] used by
//! tests and tools. Two strategies are combined:
//!
//! - **absolute** search, a breadth-first walk of real exits from the origin
//!   up to a hop radius, used when either endpoint has no coordinates;
//! - **relative** search, used when both endpoints have coordinates: the
//!   rooms lying on the straight line between them are chained two by two
//!   with short absolute searches, and gaps are bridged by synthetic exits.
//!
//! A path containing a synthetic exit is discontinuous and is only returned
//! when both endpoint rooms tolerate it.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::coords::Coords;
use crate::direction::Direction;
use crate::ids::EntityId;
use crate::path::{Exit, Path, PathSet};
use crate::vector::Vec3;

/// Hop radius of [`rooms_around`] when the caller has no preference.
pub const DEFAULT_RADIUS: usize = 5;
/// Hop radius of the absolute fallback of [`try_find_path`].
pub const ABSOLUTE_SEARCH_RADIUS: usize = 4;
/// Hop radius used to chain two consecutive rooms of a relative search.
pub const SEGMENT_RADIUS: usize = 2;
/// Maximum straight-line distance of a relative search.
pub const MAX_RELATIVE_DISTANCE: f64 = 25.0;

/// Why a path request failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("the distance between {origin} and {destination} is {distance:.1}, above {MAX_RELATIVE_DISTANCE}")]
    TooFar {
        origin: EntityId,
        destination: EntityId,
        distance: f64,
    },
    #[error("no path from {origin} to {destination} within {radius} exits")]
    NotFound {
        origin: EntityId,
        destination: EntityId,
        radius: usize,
    },
    #[error("the path found does not start at {origin} or does not end at {destination}")]
    WrongEndpoints {
        origin: EntityId,
        destination: EntityId,
    },
    #[error("only a discontinuous path links {origin} to {destination} and both do not accept it")]
    Discontinuous {
        origin: EntityId,
        destination: EntityId,
    },
    #[error("an exit leaving {next} cannot follow a path ending in {at}")]
    Broken { at: EntityId, next: EntityId },
}

/// Read access to a room graph.
pub trait RoomGraph {
    /// Exits of `room`, in direction slot order.
    fn exits(&self, room: EntityId) -> Vec<Exit>;

    /// Coordinates of `room`, `None` when the room is graph-only.
    fn coords(&self, room: EntityId) -> Option<Coords>;

    /// Whether `room` tolerates discontinuous paths (coasts, open water).
    fn accepts_discontinuous(&self, room: EntityId) -> bool;

    /// Room standing at `coords`, if any.
    fn room_at(&self, coords: Coords) -> Option<EntityId>;

    /// Whether a character could actually take `exit`.
    fn is_passable(&self, exit: &Exit) -> bool {
        !exit.synthetic && !exit.locked
    }

    /// Rooms with coordinates within `radius` of `center`.
    fn rooms_within(&self, center: Coords, radius: usize) -> Vec<(EntityId, Coords)> {
        let r = radius as i32;
        let mut found = Vec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    let at = Coords::new(center.x + dx, center.y + dy, center.z + dz);
                    if center.distance(&at) > radius as f64 {
                        continue;
                    }
                    if let Some(room) = self.room_at(at) {
                        found.push((room, at));
                    }
                }
            }
        }
        found
    }
}

/// Search options for [`search_around`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Skip exits [`RoomGraph::is_passable`] refuses.
    pub passable_only: bool,
    /// Follow real exits only, no coordinate shortcuts.
    pub absolute: bool,
}

/// Builds a synthetic exit going straight from one room to another.
pub fn synthetic_exit(origin: EntityId, from: Coords, destination: EntityId, to: Coords) -> Exit {
    let vector = Vec3::from(to) - Vec3::from(from);
    Exit {
        origin,
        destination,
        direction: vector.direction_name(),
        length: vector.norm(),
        hidden: false,
        locked: false,
        synthetic: true,
    }
}

/// Paths from `origin` to every room reachable within `radius` exits.
///
/// Rooms that do not tolerate discontinuous paths only follow passable
/// exits. When `origin` has coordinates, rooms lying within `radius` that the
/// walk did not reach are added as one synthetic hop; those shortcuts say
/// nothing about actual reachability.
pub fn rooms_around<G: RoomGraph + ?Sized>(graph: &G, origin: EntityId, radius: usize) -> PathSet {
    let options = SearchOptions {
        passable_only: !graph.accepts_discontinuous(origin),
        absolute: false,
    };
    search_around(graph, origin, radius, options)
}

/// Breadth-first expansion from `origin`, shortest hop count first.
pub fn search_around<G: RoomGraph + ?Sized>(
    graph: &G,
    origin: EntityId,
    radius: usize,
    options: SearchOptions,
) -> PathSet {
    let mut paths = PathSet::new();
    let mut visited: HashSet<EntityId> = HashSet::from([origin]);
    let mut frontier: VecDeque<(EntityId, Path)> = VecDeque::from([(origin, Path::new())]);

    while let Some((room, path)) = frontier.pop_front() {
        if path.len() >= radius {
            continue;
        }
        for exit in graph.exits(room) {
            if options.passable_only && !graph.is_passable(&exit) {
                continue;
            }
            let destination = exit.destination;
            if !visited.insert(destination) {
                continue;
            }
            let mut next = path.clone();
            if next.push(exit).is_err() {
                continue;
            }
            paths.offer(next.clone());
            frontier.push_back((destination, next));
        }
    }

    if !options.absolute {
        if let Some(center) = graph.coords(origin) {
            for (room, at) in graph.rooms_within(center, radius) {
                if room == origin || paths.contains(room) {
                    continue;
                }
                paths.offer(Path::single(synthetic_exit(origin, center, room, at)));
            }
        }
    }

    paths
}

/// Real-exit path from `origin` to `destination` within `radius` hops.
pub fn find_path_absolute<G: RoomGraph + ?Sized>(
    graph: &G,
    origin: EntityId,
    destination: EntityId,
    radius: usize,
) -> Result<Path, PathError> {
    if origin == destination {
        return Err(PathError::WrongEndpoints { origin, destination });
    }
    let options = SearchOptions {
        passable_only: false,
        absolute: true,
    };
    search_around(graph, origin, radius, options)
        .get(destination)
        .cloned()
        .ok_or(PathError::NotFound {
            origin,
            destination,
            radius,
        })
}

/// Rooms met along the straight line from `origin` to `destination`, one
/// sample per unit of distance. The origin comes first and the destination
/// last; rooms in between appear once, in line order.
pub fn rooms_between<G: RoomGraph + ?Sized>(
    graph: &G,
    origin: (EntityId, Coords),
    destination: (EntityId, Coords),
) -> Vec<EntityId> {
    let start = Vec3::from(origin.1);
    let vector = Vec3::from(destination.1) - start;
    let steps = vector.norm().ceil().max(1.0) as usize;

    let mut rooms = vec![origin.0];
    let mut seen: HashSet<EntityId> = HashSet::from([origin.0, destination.0]);
    for i in 1..steps {
        let sample = start + vector * (i as f64 / steps as f64);
        if let Some(room) = graph.room_at(sample.round()) {
            if seen.insert(room) {
                rooms.push(room);
            }
        }
    }
    if origin.0 != destination.0 {
        rooms.push(destination.0);
    }
    rooms
}

/// Finds a path from `origin` to `destination`, explaining any failure.
///
/// A room has no path to itself. The returned path is contiguous, starts
/// at `origin`, ends at `destination` and is shortened.
pub fn try_find_path<G: RoomGraph + ?Sized>(
    graph: &G,
    origin: EntityId,
    destination: EntityId,
) -> Result<Path, PathError> {
    if origin == destination {
        return Err(PathError::WrongEndpoints { origin, destination });
    }

    let (Some(from), Some(to)) = (graph.coords(origin), graph.coords(destination)) else {
        return find_path_absolute(graph, origin, destination, ABSOLUTE_SEARCH_RADIUS);
    };

    let distance = from.distance(&to);
    if distance > MAX_RELATIVE_DISTANCE {
        return Err(PathError::TooFar {
            origin,
            destination,
            distance,
        });
    }

    let rooms = rooms_between(graph, (origin, from), (destination, to));
    let mut path = Path::new();
    let mut continuous = true;
    for pair in rooms.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        match find_path_absolute(graph, a, b, SEGMENT_RADIUS) {
            Ok(segment) => path.extend(&segment)?,
            Err(_) => {
                let (Some(a_at), Some(b_at)) = (graph.coords(a), graph.coords(b)) else {
                    return Err(PathError::NotFound {
                        origin,
                        destination,
                        radius: SEGMENT_RADIUS,
                    });
                };
                continuous = false;
                path.push(synthetic_exit(a, a_at, b, b_at))?;
            }
        }
    }

    if path.origin() != Some(origin) || path.destination() != Some(destination) {
        return Err(PathError::WrongEndpoints {
            origin,
            destination,
        });
    }

    if !continuous
        && !(graph.accepts_discontinuous(origin) && graph.accepts_discontinuous(destination))
    {
        return Err(PathError::Discontinuous {
            origin,
            destination,
        });
    }

    path.shorten();
    Ok(path)
}

/// Like [`try_find_path`], treating every failure as "no path".
pub fn find_path<G: RoomGraph + ?Sized>(
    graph: &G,
    origin: EntityId,
    destination: EntityId,
) -> Option<Path> {
    try_find_path(graph, origin, destination).ok()
}

/// Straight-line paths from `origin`: after the first exit, only exits going
/// the same way are followed. A strictly shorter path to an already known
/// destination replaces the old one.
pub fn straight_paths<G: RoomGraph + ?Sized>(
    graph: &G,
    origin: EntityId,
    radius: usize,
    direction: Option<Direction>,
) -> PathSet {
    let mut paths = PathSet::new();
    if radius > 0 {
        walk_straight(graph, origin, radius, direction, &mut paths, &Path::new());
    }
    paths
}

fn walk_straight<G: RoomGraph + ?Sized>(
    graph: &G,
    room: EntityId,
    radius: usize,
    direction: Option<Direction>,
    paths: &mut PathSet,
    base: &Path,
) {
    for exit in graph.exits(room) {
        if direction.is_some_and(|d| d != exit.direction) {
            continue;
        }
        let way = exit.direction;
        let destination = exit.destination;
        let mut next = base.clone();
        if next.push(exit).is_err() || next.origin() == next.destination() {
            continue;
        }
        if paths.offer(next.clone()) && radius > 1 {
            walk_straight(graph, destination, radius - 1, Some(way), paths, &next);
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MapRoom {
    coords: Option<Coords>,
    tolerant: bool,
    exits: BTreeMap<Direction, Exit>,
}

/// Standalone room graph, independent of any world storage.
#[derive(Debug, Clone, Default)]
pub struct MapGraph {
    rooms: BTreeMap<EntityId, MapRoom>,
    by_coords: HashMap<Coords, EntityId>,
}

impl MapGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_room(&mut self, id: EntityId, coords: Option<Coords>) -> &mut Self {
        if let Some(at) = coords {
            self.by_coords.insert(at, id);
        }
        self.rooms.entry(id).or_default().coords = coords;
        self
    }

    pub fn set_tolerant(&mut self, id: EntityId, tolerant: bool) -> &mut Self {
        self.rooms.entry(id).or_default().tolerant = tolerant;
        self
    }

    /// Adds a one-way exit, replacing whatever used the same slot.
    pub fn add_exit(&mut self, exit: Exit) -> &mut Self {
        self.rooms
            .entry(exit.origin)
            .or_default()
            .exits
            .insert(exit.direction, exit);
        self
    }

    /// Adds an exit and its reciprocal.
    pub fn link(&mut self, a: EntityId, direction: Direction, b: EntityId) -> &mut Self {
        self.add_exit(Exit::new(a, direction, b));
        self.add_exit(Exit::new(b, direction.opposite(), a));
        self
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl RoomGraph for MapGraph {
    fn exits(&self, room: EntityId) -> Vec<Exit> {
        self.rooms
            .get(&room)
            .map(|r| r.exits.values().cloned().collect())
            .unwrap_or_default()
    }

    fn coords(&self, room: EntityId) -> Option<Coords> {
        self.rooms.get(&room).and_then(|r| r.coords)
    }

    fn accepts_discontinuous(&self, room: EntityId) -> bool {
        self.rooms.get(&room).is_some_and(|r| r.tolerant)
    }

    fn room_at(&self, coords: Coords) -> Option<EntityId> {
        self.by_coords.get(&coords).copied()
    }
}
