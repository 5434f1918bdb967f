//! Integration tests for path finding and ship movement.
//!
//! Exercises: MapGraph → try_find_path / rooms_around / straight_paths,
//! and Vessel → Expanse collision sweeps.
//!
//! All tests are pure logic, no world storage.

use kassie_logic::collision::Impact;
use kassie_logic::expanse::Expanse;
use kassie_logic::pathfinding::{
    find_path, rooms_around, straight_paths, try_find_path, MapGraph, PathError,
    MAX_RELATIVE_DISTANCE,
};
use kassie_logic::vessel::Vessel;
use kassie_logic::{Coords, Direction, EntityId, Exit, Vec3};

// ── Helpers ────────────────────────────────────────────────────────────

fn id(n: u64) -> EntityId {
    EntityId(n)
}

/// `zone1:a` at the origin with a one-way east exit to `zone1:b`.
fn a_and_b() -> MapGraph {
    let mut graph = MapGraph::new();
    graph
        .add_room(id(1), Some(Coords::new(0, 0, 0)))
        .add_room(id(2), Some(Coords::new(1, 0, 0)))
        .add_exit(Exit::new(id(1), Direction::East, id(2)));
    graph
}

/// A straight east-west street of `len` rooms starting at x = 0.
fn street(len: u64) -> MapGraph {
    let mut graph = MapGraph::new();
    for i in 0..len {
        graph.add_room(id(i + 1), Some(Coords::new(i as i32, 0, 0)));
        if i > 0 {
            graph.link(id(i), Direction::East, id(i + 1));
        }
    }
    graph
}

fn assert_well_formed(path: &kassie_logic::Path, origin: EntityId, destination: EntityId) {
    assert!(path.is_contiguous());
    assert_eq!(path.origin(), Some(origin));
    assert_eq!(path.destination(), Some(destination));
}

// ── Path finding ───────────────────────────────────────────────────────

#[test]
fn one_exit_east() {
    let graph = a_and_b();
    let path = find_path(&graph, id(1), id(2)).expect("a path from a to b");
    assert_eq!(path.len(), 1);
    assert_eq!(path.exits()[0].direction, Direction::East);
    assert_well_formed(&path, id(1), id(2));
}

#[test]
fn no_way_back_without_tolerance() {
    let graph = a_and_b();
    assert!(find_path(&graph, id(2), id(1)).is_none());
    let err = try_find_path(&graph, id(2), id(1)).unwrap_err();
    assert!(matches!(err, PathError::Discontinuous { .. }));
}

#[test]
fn tolerant_rooms_accept_a_broken_path() {
    let mut graph = a_and_b();
    graph.set_tolerant(id(1), true).set_tolerant(id(2), true);
    let path = find_path(&graph, id(2), id(1)).expect("a discontinuous path");
    assert!(!path.is_continuous());
    assert_eq!(path.directions(), vec![Direction::West]);
    assert_well_formed(&path, id(2), id(1));
}

#[test]
fn only_one_tolerant_endpoint_is_not_enough() {
    let mut graph = a_and_b();
    graph.set_tolerant(id(2), true);
    assert!(find_path(&graph, id(2), id(1)).is_none());
}

#[test]
fn distance_bound() {
    let mut graph = MapGraph::new();
    graph
        .add_room(id(1), Some(Coords::new(0, 0, 0)))
        .add_room(id(2), Some(Coords::new(26, 0, 0)))
        .add_exit(Exit::new(id(1), Direction::East, id(2)))
        .set_tolerant(id(1), true)
        .set_tolerant(id(2), true);

    assert!(find_path(&graph, id(1), id(2)).is_none());
    match try_find_path(&graph, id(1), id(2)) {
        Err(PathError::TooFar { distance, .. }) => assert!(distance > MAX_RELATIVE_DISTANCE),
        other => panic!("expected TooFar, got {other:?}"),
    }
}

#[test]
fn long_street_is_chained() {
    let graph = street(20);
    let path = find_path(&graph, id(1), id(20)).expect("a path along the street");
    assert_eq!(path.len(), 19);
    assert!(path.is_continuous());
    assert!(path.directions().iter().all(|d| *d == Direction::East));
    assert_well_formed(&path, id(1), id(20));
}

#[test]
fn detour_around_a_gap() {
    // 1 (0,0) → 3 (2,0) has no room at (1,0); the way goes through 2 at (1,1)
    let mut graph = MapGraph::new();
    graph
        .add_room(id(1), Some(Coords::new(0, 0, 0)))
        .add_room(id(2), Some(Coords::new(1, 1, 0)))
        .add_room(id(3), Some(Coords::new(2, 0, 0)))
        .link(id(1), Direction::NorthEast, id(2))
        .link(id(2), Direction::SouthEast, id(3));

    let path = find_path(&graph, id(1), id(3)).expect("a path around the gap");
    assert_eq!(
        path.directions(),
        vec![Direction::NorthEast, Direction::SouthEast]
    );
    assert!(path.is_continuous());
}

#[test]
fn rooms_without_coordinates_use_the_exit_graph() {
    let mut graph = MapGraph::new();
    for n in 1..=5 {
        graph.add_room(id(n), None);
    }
    graph
        .link(id(1), Direction::Up, id(2))
        .link(id(2), Direction::North, id(3))
        .link(id(3), Direction::North, id(4))
        .link(id(4), Direction::North, id(5));

    let path = find_path(&graph, id(1), id(4)).expect("within the absolute radius");
    assert_eq!(path.len(), 3);
    assert_well_formed(&path, id(1), id(4));

    // five hops away: beyond the absolute radius
    graph.add_room(id(6), None).link(id(5), Direction::West, id(6));
    assert!(matches!(
        try_find_path(&graph, id(1), id(6)),
        Err(PathError::NotFound { .. })
    ));
}

#[test]
fn rooms_around_within_radius() {
    let graph = street(8);
    let around = rooms_around(&graph, id(4), 2);
    let mut found = around.destinations();
    found.sort();
    assert_eq!(found, vec![id(2), id(3), id(5), id(6)]);
    for path in around.iter() {
        assert!(path.is_contiguous());
        assert_eq!(path.origin(), Some(id(4)));
    }
}

#[test]
fn straight_paths_along_the_street() {
    let graph = street(6);
    let paths = straight_paths(&graph, id(3), 10, Some(Direction::East));
    let mut found = paths.destinations();
    found.sort();
    assert_eq!(found, vec![id(4), id(5), id(6)]);
    assert_eq!(paths.get(id(6)).map(|p| p.len()), Some(3));
}

// ── Ship movement ──────────────────────────────────────────────────────

#[test]
fn collision_rolls_back_and_stops() {
    let mut expanse = Expanse::new("bay", 0);
    expanse.add_obstacle(3, 0, "reef");

    let mut vessel = Vessel::new(Vec3::new(-0.5, 0.0, 0.0), vec![Coords::default()]);
    vessel.kinematics.drag = 0.0;
    vessel.kinematics.velocity = Vec3::new(5.0, 0.0, 0.0);

    let outcome = vessel.advance(1.0, Some(&expanse));
    assert!(outcome.collided);
    assert!(vessel.in_collision);
    // the sample at x = 2.5 lies 0.5 from the reef, the previous one is safe
    assert_eq!(vessel.position(), Vec3::new(1.5, 0.0, 0.0));
    assert_eq!(vessel.kinematics.velocity, Vec3::ZERO);
    assert_eq!(vessel.kinematics.acceleration, Vec3::ZERO);
    assert_eq!(outcome.impact, Some(Impact::Violent));
    assert_eq!(outcome.messages, vec![Impact::Violent.message().to_string()]);
}

#[test]
fn open_water_is_clear() {
    let mut expanse = Expanse::new("bay", 0);
    expanse.add_obstacle(3, 10, "reef");

    let mut vessel = Vessel::new(Vec3::ZERO, vec![Coords::default(), Coords::new(0, 1, 0)]);
    vessel.kinematics.drag = 0.0;
    vessel.kinematics.velocity = Vec3::new(2.0, 0.0, 0.0);

    let outcome = vessel.advance(1.0, Some(&expanse));
    assert!(!outcome.collided);
    assert!(!vessel.in_collision);
    assert_eq!(vessel.position(), Vec3::new(2.0, 0.0, 0.0));
}
