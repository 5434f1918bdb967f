//! Kassie Headless Simulation Harness
//!
//! Builds (or loads) the demo harbour, runs the engine for a number of ticks,
//! saves the world, reloads it into a fresh world and checks the result.
//! Runs entirely in-process: no network, no clients.
//!
//! Usage:
//!   cargo run -p kassie-simtest
//!   cargo run -p kassie-simtest -- --storage-mode document --storage-dir /tmp/kassie --ticks 120

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use kassie_core::components::{Character, Expanse, Room, Ship};
use kassie_core::config::ServerConfig;
use kassie_core::engine::Engine;
use kassie_core::generation::{generate_demo, DemoConfig, HARBOUR_ZONE};
use kassie_core::persistence::{Persistence, StorageMode, MEMORY_LOCATION};
use kassie_core::world::GameWorld;
use kassie_logic::constants::SAIL_HANDLING_DELAY;
use kassie_logic::pathfinding::{find_path, try_find_path, MapGraph, PathError, RoomGraph};
use kassie_logic::sailing::Element;
use kassie_logic::{Coords, Direction, EntityId, Exit};

/// Kassie headless simulation harness
#[derive(Parser, Debug)]
#[command(name = "kassie-simtest", version)]
#[command(about = "Run the Kassie world headless, save it, reload it and check it")]
struct Args {
    /// YAML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Storage directory, or `memory:` for an in-memory document store
    #[arg(long)]
    storage_dir: Option<String>,

    /// Storage mode: snapshot, files or document
    #[arg(long)]
    storage_mode: Option<String>,

    /// Number of ticks to run
    #[arg(long, default_value_t = 60)]
    ticks: u32,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = 1.0)]
    tick_seconds: f64,

    /// Seed of the demo world
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Print passing checks too
    #[arg(long, short = 'v')]
    verbose: bool,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("=== Kassie Simulation Harness ===\n");
    let mut results = Vec::new();

    // 1. Run the world
    let engine = match run_world(&args, config.clone(), &mut results) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Path finding on the live world
    results.extend(validate_paths(&engine.world));

    // 3. Distance bound on a synthetic graph
    results.extend(validate_distance_bound());

    // 4. Ships
    results.extend(validate_ships(&engine.world, &args));

    // 5. Reload round trip
    results.extend(validate_reload(&engine.world, &config));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, results.len(), failed);

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Configuration file first, then command-line overrides.
fn build_config(args: &Args) -> Result<ServerConfig, kassie_core::error::ConfigError> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(dir) = &args.storage_dir {
        config.storage.location = dir.clone();
    }
    if let Some(mode) = &args.storage_mode {
        config.storage.mode = mode.clone();
    }
    config.validate()?;
    Ok(config)
}

// ── 1. World ────────────────────────────────────────────────────────────

fn run_world(
    args: &Args,
    config: ServerConfig,
    results: &mut Vec<TestResult>,
) -> Result<Engine, kassie_core::error::PersistError> {
    println!("--- World ---");
    let mut engine = Engine::new(config)?;
    let loaded = engine.start()?;

    if loaded == 0 {
        let demo_config = DemoConfig {
            seed: args.seed,
            ..DemoConfig::default()
        };
        let demo = generate_demo(&mut engine.world, &demo_config)?;
        engine.persistence.flush_all(&mut engine.world)?;
        results.push(TestResult::new(
            "world_generated",
            engine.world.room_count() > 0,
            format!("{} rooms, {} characters", engine.world.room_count(), demo.characters.len()),
        ));
    } else {
        results.push(TestResult::new(
            "world_loaded",
            engine.world.room_count() > 0,
            format!("{loaded} entities, {} rooms", engine.world.room_count()),
        ));
    }

    if let Some(captain) = captain_aboard(&engine.world) {
        match engine.hoist(captain) {
            Ok(()) => log::info!("{captain} starts hoisting the sail"),
            Err(e) => log::info!("{captain} cannot hoist: {e}"),
        }
    }

    for _ in 0..args.ticks {
        engine.update(args.tick_seconds)?;
    }
    engine.shutdown()?;
    println!("  ran {} ticks, clock at {:.0}s", args.ticks, engine.now());
    Ok(engine)
}

/// First character standing in a ship room with a sail.
fn captain_aboard(world: &GameWorld) -> Option<EntityId> {
    world.ids_of::<Character>().into_iter().find(|id| {
        let Some(room) = world.get::<Character>(*id).and_then(|c| c.room) else {
            return false;
        };
        let Some(ship) = world.get::<Room>(room).and_then(|r| r.ship) else {
            return false;
        };
        world.get::<Ship>(ship).is_some_and(|s| {
            let offset = s.offset_of(room);
            s.vessel
                .elements
                .iter()
                .any(|m| Some(m.room) == offset && matches!(m.element, Element::Sail(_)))
        })
    })
}

// ── 2. Paths ────────────────────────────────────────────────────────────

/// Harbour rooms by coordinates, south-west first.
fn harbour_rooms(world: &GameWorld) -> Vec<(Coords, EntityId)> {
    let mut rooms: Vec<(Coords, EntityId)> = world
        .ids_of::<Room>()
        .into_iter()
        .filter(|id| world.is_live(*id))
        .filter_map(|id| {
            let room = world.get::<Room>(id)?;
            (room.zone == HARBOUR_ZONE).then_some(())?;
            room.coords.map(|c| (c, id))
        })
        .collect();
    rooms.sort_by_key(|(c, _)| (c.y, c.x));
    rooms
}

fn validate_paths(world: &GameWorld) -> Vec<TestResult> {
    println!("--- Paths ---");
    let mut results = Vec::new();
    let rooms = harbour_rooms(world);
    let (Some(first), Some(last)) = (rooms.first(), rooms.last()) else {
        results.push(TestResult::new("harbour_rooms", false, "no harbour room"));
        return results;
    };

    let same = find_path(world, first.1, first.1);
    results.push(TestResult::new(
        "path_same_room",
        same.is_none(),
        "no path from a room to itself",
    ));

    let corner = find_path(world, first.1, last.1);
    results.push(TestResult::new(
        "path_contiguous",
        corner
            .as_ref()
            .is_some_and(|p| p.is_contiguous() && p.origin() == Some(first.1) && p.destination() == Some(last.1)),
        format!("{:?} → {:?}", first.0, last.0),
    ));

    // Every harbour room is reachable from the first one.
    let unreachable = rooms
        .iter()
        .filter(|(_, id)| find_path(world, first.1, *id).is_none())
        .count();
    results.push(TestResult::new(
        "path_all_reachable",
        unreachable == 0,
        format!("{unreachable} of {} rooms unreachable", rooms.len()),
    ));

    // Following the exits of a path lands where it says.
    let follows = corner.as_ref().is_some_and(|path| {
        path.exits().iter().all(|exit| {
            world
                .exits(exit.origin)
                .iter()
                .any(|real| real.direction == exit.direction && real.destination == exit.destination)
                || exit.synthetic
        })
    });
    results.push(TestResult::new("path_follows_exits", follows, "every exit exists in the world"));
    results
}

// ── 3. Distance bound ───────────────────────────────────────────────────

fn validate_distance_bound() -> Vec<TestResult> {
    println!("--- Distance bound ---");
    let near = EntityId(1);
    let far = EntityId(2);
    let mut graph = MapGraph::new();
    graph
        .add_room(near, Some(Coords::new(0, 0, 0)))
        .add_room(far, Some(Coords::new(30, 0, 0)))
        .add_exit(Exit::new(near, Direction::East, far));

    vec![
        TestResult::new(
            "distance_bound_none",
            find_path(&graph, near, far).is_none(),
            "30 units apart → no path even with a direct exit",
        ),
        TestResult::new(
            "distance_bound_explained",
            matches!(try_find_path(&graph, near, far), Err(PathError::TooFar { .. })),
            "explicit search reports the distance",
        ),
    ]
}

// ── 4. Ships ────────────────────────────────────────────────────────────

fn validate_ships(world: &GameWorld, args: &Args) -> Vec<TestResult> {
    println!("--- Ships ---");
    let mut results = Vec::new();

    for id in world.ids_of::<Ship>() {
        let Some(ship) = world.get::<Ship>(id) else {
            continue;
        };

        // Rooms sit where the vessel places them.
        let mut misplaced = 0;
        for (offset, at) in ship.vessel.room_positions() {
            let coords = ship
                .room_at_offset(offset)
                .and_then(|room| world.coords(room));
            if coords != Some(at.round()) {
                misplaced += 1;
            }
        }
        results.push(TestResult::new(
            &format!("ship_{}_rooms_follow", ship.key),
            misplaced == 0,
            format!("{misplaced} rooms out of place"),
        ));

        // No room stands on an obstacle.
        if let Some(expanse) = ship.expanse.and_then(|e| world.get::<Expanse>(e)) {
            let aground = ship
                .vessel
                .room_positions()
                .iter()
                .filter(|(_, at)| {
                    let c = at.round();
                    expanse.obstacles.contains_key(&(c.x, c.y))
                })
                .count();
            results.push(TestResult::new(
                &format!("ship_{}_clear_of_reefs", ship.key),
                aground == 0,
                format!("{aground} rooms on a reef"),
            ));
        }

        let elapsed = args.ticks as f64 * args.tick_seconds;
        if elapsed > SAIL_HANDLING_DELAY {
            let hoisted = ship.vessel.sails().iter().any(|s| s.hoisted);
            results.push(TestResult::new(
                &format!("ship_{}_sail_hoisted", ship.key),
                hoisted,
                format!("after {elapsed:.0}s"),
            ));
        }
    }
    results
}

// ── 5. Reload ───────────────────────────────────────────────────────────

/// Live entities by type name, and room keys.
fn census(world: &GameWorld) -> (BTreeMap<String, usize>, Vec<String>) {
    let mut types = BTreeMap::new();
    for id in world.live_ids() {
        if let Some(meta) = world.meta(id) {
            *types.entry(meta.type_name.to_string()).or_insert(0) += 1;
        }
    }
    let mut keys: Vec<String> = world
        .ids_of::<Room>()
        .into_iter()
        .filter_map(|id| world.get::<Room>(id).map(|r| r.key()))
        .collect();
    keys.sort();
    (types, keys)
}

fn validate_reload(world: &GameWorld, config: &ServerConfig) -> Vec<TestResult> {
    println!("--- Reload ---");
    let mut results = Vec::new();
    if !config.storage.enabled || config.storage.location == MEMORY_LOCATION {
        results.push(TestResult::new("reload", true, "skipped, nothing on disk"));
        return results;
    }

    let mut reloaded = GameWorld::new();
    let mode = match config.storage.storage_mode() {
        Ok(mode) => mode,
        Err(e) => {
            results.push(TestResult::new("reload_open", false, e.to_string()));
            return results;
        }
    };
    let loaded = Persistence::open(mode, &config.storage.location).and_then(|mut p| p.load(&mut reloaded));
    if let Err(e) = loaded {
        results.push(TestResult::new("reload_load", false, e.to_string()));
        return results;
    }

    let (before_types, before_keys) = census(world);
    let (after_types, after_keys) = census(&reloaded);
    results.push(TestResult::new(
        "reload_same_entities",
        before_types == after_types,
        format!("{before_types:?} vs {after_types:?}"),
    ));
    results.push(TestResult::new(
        "reload_same_rooms",
        before_keys == after_keys,
        format!("{} room keys", before_keys.len()),
    ));

    // Snapshot and per-file storage keep ids, so records must match exactly.
    if mode != StorageMode::Document {
        let differing = world
            .live_ids()
            .into_iter()
            .filter(|id| world.extract(*id) != reloaded.extract(*id))
            .count();
        results.push(TestResult::new(
            "reload_same_records",
            differing == 0,
            format!("{differing} records differ"),
        ));
    }

    let broken = reloaded
        .ids_of::<Character>()
        .into_iter()
        .filter(|id| {
            let room = reloaded.get::<Character>(*id).and_then(|c| c.room);
            !room.is_some_and(|room| {
                reloaded
                    .get::<Room>(room)
                    .is_some_and(|r| r.characters.contains(id))
            })
        })
        .count();
    results.push(TestResult::new(
        "reload_presence_cycle",
        broken == 0,
        format!("{broken} characters not listed by their room"),
    ));
    results
}
