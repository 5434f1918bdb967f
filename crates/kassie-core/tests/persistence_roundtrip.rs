//! Integration tests for the persistence backends.
//!
//! Exercises: generate_demo → Persistence::flush_all → a fresh world
//! → Persistence::load, for each storage mode, plus deletion, duplicate
//! singletons, damaged snapshots, restarts, long room chains and ships
//! running aground in a live world.

use std::path::Path;

use kassie_core::components::{Character, Expanse, Item, PermissionGroups, Room, Ship};
use kassie_core::generation::{generate_demo, sloop_model, DemoConfig, DemoWorld, HARBOUR_ZONE, SLOOP_KEY};
use kassie_core::persistence::json::encode_record;
use kassie_core::persistence::{
    DocumentBackend, DocumentStore, FlushOutcome, FlushReport, InMemoryDocumentStore, JsonDirStore,
    Persistence, StorageMode, SNAPSHOT_FILE,
};
use kassie_core::record::Persistent;
use kassie_core::systems::{launch_ship, ship_tick};
use kassie_core::world::GameWorld;
use kassie_logic::{Direction, EntityId, Vec3};

// ── Helpers ────────────────────────────────────────────────────────────

fn demo() -> (GameWorld, DemoWorld) {
    let mut world = GameWorld::new();
    let demo = generate_demo(&mut world, &DemoConfig::default()).unwrap();
    (world, demo)
}

fn open(mode: StorageMode, dir: &Path) -> Persistence {
    Persistence::open(mode, &dir.to_string_lossy()).unwrap()
}

fn report(outcome: FlushOutcome) -> FlushReport {
    match outcome {
        FlushOutcome::Written(report) => report,
        FlushOutcome::Skipped => panic!("flush was skipped"),
    }
}

fn reload(mode: StorageMode, dir: &Path) -> (GameWorld, usize) {
    let mut world = GameWorld::new();
    let loaded = open(mode, dir).load(&mut world).unwrap();
    (world, loaded)
}

/// Every character is listed by the room it stands in.
fn assert_presence_consistent(world: &GameWorld) {
    for id in world.ids_of::<Character>() {
        let room = world.get::<Character>(id).unwrap().room.expect("character has a room");
        assert!(world.get::<Room>(room).unwrap().characters.contains(&id));
    }
}

// ── Id-preserving backends ─────────────────────────────────────────────

#[test]
fn test_snapshot_roundtrip_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, demo) = demo();
    let mut persistence = open(StorageMode::Snapshot, dir.path());
    persistence.flush_all(&mut world).unwrap();

    let (loaded, count) = reload(StorageMode::Snapshot, dir.path());
    assert_eq!(count, world.live_ids().len());
    assert_eq!(loaded.live_ids(), world.live_ids());
    for id in world.live_ids() {
        assert_eq!(loaded.extract(id), world.extract(id), "entity {id}");
    }
    assert_eq!(loaded.room_by_key(HARBOUR_ZONE, "r0_0"), demo.room_at(&DemoConfig::default(), 0, 0));
    assert_presence_consistent(&loaded);
}

#[test]
fn test_truncated_snapshot_loads_an_empty_world() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, _) = demo();
    open(StorageMode::Snapshot, dir.path()).flush_all(&mut world).unwrap();

    let file = dir.path().join(SNAPSHOT_FILE);
    let bytes = std::fs::read(&file).unwrap();
    std::fs::write(&file, &bytes[..bytes.len() / 2]).unwrap();

    let (loaded, count) = reload(StorageMode::Snapshot, dir.path());
    assert_eq!(count, 0);
    assert!(loaded.is_empty());
}

#[test]
fn test_files_roundtrip_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, demo) = demo();
    let mut persistence = open(StorageMode::Files, dir.path());
    let written = report(persistence.flush_all(&mut world).unwrap());
    assert_eq!(written.written, world.live_ids().len());
    assert!(dir.path().join("rooms").is_dir());
    assert!(dir.path().join("permissions").join("PermissionGroups.sav").is_file());

    let (loaded, _) = reload(StorageMode::Files, dir.path());
    assert_eq!(loaded.live_ids(), world.live_ids());
    for id in world.live_ids() {
        assert_eq!(loaded.extract(id), world.extract(id), "entity {id}");
    }
    assert_eq!(loaded.get::<Ship>(demo.ship).unwrap().key, SLOOP_KEY);
}

#[test]
fn test_files_delete_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, demo) = demo();
    let mut persistence = open(StorageMode::Files, dir.path());
    persistence.flush_all(&mut world).unwrap();

    let item = demo.items[0];
    let file = dir.path().join("items").join(format!("{}.sav", item.raw()));
    assert!(file.is_file());
    persistence.delete(&mut world, item).unwrap();
    assert!(!file.exists());
    assert!(!world.contains(item));

    let (loaded, _) = reload(StorageMode::Files, dir.path());
    assert!(!loaded.contains(item));
}

// ── Document backend ───────────────────────────────────────────────────

#[test]
fn test_document_cycles_converge_in_one_flush() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, _) = demo();
    let mut persistence = open(StorageMode::Document, dir.path());

    let first = report(persistence.flush_all(&mut world).unwrap());
    assert!(first.retried > 0, "character and room refer to each other");
    assert_eq!(first.failed, 0);
    assert!(world.live_ids().iter().all(|id| world.store_id(*id).is_some()));

    let (loaded, count) = reload(StorageMode::Document, dir.path());
    assert_eq!(count, world.live_ids().len());
    assert_eq!(loaded.room_count(), world.room_count());
    assert_presence_consistent(&loaded);

    // Every reference resolved: items are held by characters that hold them.
    for id in loaded.ids_of::<Item>() {
        let holder = loaded.get::<Item>(id).unwrap().holder.unwrap();
        assert!(loaded.get::<Character>(holder).unwrap().inventory.contains(&id));
    }
    let ship = loaded.ids_of::<Ship>()[0];
    let rooms = loaded.get::<Ship>(ship).unwrap().rooms.clone();
    assert_eq!(rooms.len(), 3);
    for room in rooms.values() {
        assert_eq!(loaded.get::<Room>(*room).unwrap().ship, Some(ship));
    }
}

#[test]
fn test_document_second_flush_writes_nothing() {
    let (mut world, _) = demo();
    let mut persistence = Persistence::configure("document", "memory:").unwrap();
    persistence.flush_all(&mut world).unwrap();

    let again = report(persistence.flush_all(&mut world).unwrap());
    assert_eq!(again.written, 0);
    assert_eq!(again.unchanged, world.live_ids().len());
}

#[test]
fn test_document_restart_rewrites_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, _) = demo();
    open(StorageMode::Document, dir.path()).flush_all(&mut world).unwrap();

    let mut restarted = GameWorld::new();
    let mut persistence = open(StorageMode::Document, dir.path());
    let count = persistence.load(&mut restarted).unwrap();
    let again = report(persistence.flush_all(&mut restarted).unwrap());
    assert_eq!(again.written, 0);
    assert_eq!(again.unchanged, count);
}

#[test]
fn test_document_restart_without_initial_load_rewrites_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, _) = demo();
    open(StorageMode::Document, dir.path()).flush_all(&mut world).unwrap();

    let store = JsonDirStore::open(dir.path().join("documents")).unwrap();
    let backend = DocumentBackend::new(Box::new(store)).with_initial_load(false);
    let mut persistence = Persistence::with_backend(Box::new(backend), None);
    let mut restarted = GameWorld::new();
    let count = persistence.load(&mut restarted).unwrap();
    let again = report(persistence.flush_all(&mut restarted).unwrap());
    assert_eq!(again.written, count);
    assert_eq!(again.unchanged, 0);
}

#[test]
fn test_document_long_room_chain_loads() {
    const ROOMS: usize = 5000;
    let dir = tempfile::tempdir().unwrap();
    let mut world = GameWorld::new();
    let mut previous = None;
    for i in 0..ROOMS {
        let room = world.create_room("chain", &format!("r{i}"), None).unwrap();
        if let Some(previous) = previous {
            world.link_rooms(previous, Direction::East, room).unwrap();
        }
        previous = Some(room);
    }
    open(StorageMode::Document, dir.path()).flush_all(&mut world).unwrap();

    let (loaded, count) = reload(StorageMode::Document, dir.path());
    assert_eq!(count, ROOMS);
    assert_eq!(loaded.room_count(), ROOMS);
    let last = loaded.room_by_key("chain", &format!("r{}", ROOMS - 1)).unwrap();
    let before = loaded.room_by_key("chain", &format!("r{}", ROOMS - 2)).unwrap();
    let west = loaded.get::<Room>(last).unwrap().exits.get(&Direction::West).map(|s| s.destination);
    assert_eq!(west, Some(before));
}

#[test]
fn test_document_dirty_flush_writes_only_changes() {
    let (mut world, demo) = demo();
    let mut persistence = Persistence::configure("document", "memory:").unwrap();
    persistence.flush_all(&mut world).unwrap();

    world.get_mut::<Character>(demo.captain).unwrap().name = "Captain Madec".into();
    persistence.register_dirty(demo.captain);
    persistence.register_dirty(demo.captain);
    let written = report(persistence.flush_dirty(&mut world).unwrap());
    assert_eq!(written.written, 1);
    assert_eq!(persistence.dirty_len(), 0);
}

#[test]
fn test_document_delete_purges() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, demo) = demo();
    let mut persistence = open(StorageMode::Document, dir.path());
    persistence.flush_all(&mut world).unwrap();

    let items_before = world.ids_of::<Item>().len();
    persistence.delete(&mut world, demo.items[0]).unwrap();
    let (loaded, _) = reload(StorageMode::Document, dir.path());
    assert_eq!(loaded.ids_of::<Item>().len(), items_before - 1);
}

#[test]
fn test_duplicate_singleton_documents_keep_one() {
    let mut store = InMemoryDocumentStore::new();
    let document = encode_record(&PermissionGroups::standard().to_record(), &|_| None);
    store.insert(PermissionGroups::TYPE_NAME, document.clone()).unwrap();
    store.insert(PermissionGroups::TYPE_NAME, document).unwrap();

    let backend = DocumentBackend::new(Box::new(store));
    let mut persistence = Persistence::with_backend(Box::new(backend), None);
    let mut world = GameWorld::new();
    persistence.load(&mut world).unwrap();

    assert_eq!(world.ids_of::<PermissionGroups>().len(), 1);
    let found = persistence.load_singleton(&world, PermissionGroups::TYPE_NAME);
    assert_eq!(found, world.singleton_id(PermissionGroups::TYPE_NAME));
}

#[test]
fn test_deleted_entities_are_dropped_at_flush() {
    let dir = tempfile::tempdir().unwrap();
    let (mut world, demo) = demo();
    let mut persistence = open(StorageMode::Snapshot, dir.path());
    let item = demo.items[1];
    world.mark_deleted(item).unwrap();

    let written = report(persistence.flush_all(&mut world).unwrap());
    assert_eq!(written.deleted, 1);
    assert!(!world.contains(item));
    let (loaded, _) = reload(StorageMode::Snapshot, dir.path());
    assert!(!loaded.contains(item));
    assert_eq!(persistence.load_group(&loaded, "items").len(), demo.items.len() - 1);
}

// ── Ships in a live world ──────────────────────────────────────────────

#[test]
fn test_ship_runs_aground_on_a_reef() {
    let mut world = GameWorld::new();
    let mut bay = Expanse::new("reefs", 0);
    bay.add_obstacle(9, 0, "reef");
    let bay = world.spawn(bay).unwrap();
    let model = world.spawn(sloop_model()).unwrap();
    let ship = launch_ship(&mut world, model, "wreck_1", Some(bay), Vec3::ZERO).unwrap();
    {
        let mut s = world.get_mut::<Ship>(ship).unwrap();
        s.vessel.kinematics.velocity = Vec3::new(3.0, 0.0, 0.0);
        s.vessel.kinematics.drag = 0.0;
    }

    let mut collided = false;
    for _ in 0..5 {
        if ship_tick(&mut world, ship, 1.0).unwrap().collided {
            collided = true;
            break;
        }
    }
    assert!(collided);
    let s = world.get::<Ship>(ship).unwrap();
    assert!(s.vessel.in_collision);
    assert_eq!(s.vessel.kinematics.speed(), 0.0);
    // The bow stopped short of the reef.
    let bow = s.rooms.values().copied().collect::<Vec<EntityId>>();
    for room in bow {
        let coords = world.get::<Room>(room).unwrap().coords.unwrap();
        assert!(coords.x < 9, "room at {coords:?} is on the reef");
    }
}
