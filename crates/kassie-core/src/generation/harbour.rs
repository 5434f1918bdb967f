//! Harbour generation - a small seeded world for demos and the simulation test
//!
//! A grid of town rooms whose northern row is the quay of an open bay. The
//! bay carries a few reefs and two winds, and a sloop lies at anchor in it
//! with its captain aboard.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kassie_logic::sailing::{Element, Rudder, Sail, Wind};
use kassie_logic::vessel::Mounted;
use kassie_logic::{Coords, Direction, EntityId, Vec3};

use crate::components::{
    Account, Character, Expanse, Item, ModelExit, ModelRoom, PermissionGroups, Room, Ship,
    ShipModel,
};
use crate::error::WorldError;
use crate::record::Persistent;
use crate::systems::launch_ship;
use crate::world::GameWorld;

use super::names::{generate_item, generate_name};

pub const HARBOUR_ZONE: &str = "harbour";
pub const SLOOP_KEY: &str = "sloop_1";

/// Configuration for the demo world
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Town rooms along x.
    pub width: i32,
    /// Town rooms along y; the last row is the quay.
    pub height: i32,
    pub characters: usize,
    pub items_per_character: usize,
    pub reefs: usize,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 6,
            height: 4,
            characters: 8,
            items_per_character: 2,
            reefs: 5,
            seed: 7,
        }
    }
}

/// Result of demo generation
#[derive(Debug, Clone)]
pub struct DemoWorld {
    pub expanse: EntityId,
    /// Town rooms, row by row from the south.
    pub rooms: Vec<EntityId>,
    pub quay: Vec<EntityId>,
    pub model: EntityId,
    pub ship: EntityId,
    pub captain: EntityId,
    pub characters: Vec<EntityId>,
    pub items: Vec<EntityId>,
}

impl DemoWorld {
    /// Town room at grid position (x, y).
    pub fn room_at(&self, config: &DemoConfig, x: i32, y: i32) -> Option<EntityId> {
        grid_room(&self.rooms, config, x, y)
    }
}

fn grid_room(rooms: &[EntityId], config: &DemoConfig, x: i32, y: i32) -> Option<EntityId> {
    if !(0..config.width).contains(&x) || !(0..config.height).contains(&y) {
        return None;
    }
    rooms.get((y * config.width + x) as usize).copied()
}

/// Builds the demo harbour into `world`. The same seed gives the same world.
pub fn generate_demo(world: &mut GameWorld, config: &DemoConfig) -> Result<DemoWorld, WorldError> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    world.spawn(PermissionGroups::standard())?;
    let expanse = world.spawn(Expanse::new("bay", 0))?;

    let (rooms, quay) = generate_town(world, config, expanse)?;
    let anchorage = anchorage(config);
    generate_bay(world, config, anchorage, &mut rng, expanse, &quay)?;

    let model = world.spawn(sloop_model())?;
    let ship = launch_ship(world, model, SLOOP_KEY, Some(expanse), anchorage)?;

    let mast = world
        .get::<Ship>(ship)
        .and_then(|s| s.room_at_offset(Coords::new(0, 1, 0)))
        .ok_or(WorldError::UnknownEntity(ship))?;
    let (characters, items) = generate_people(world, config, &mut rng, &rooms, mast)?;
    let demo = DemoWorld {
        expanse,
        rooms,
        quay,
        model,
        ship,
        captain: characters[0],
        characters,
        items,
    };
    log::info!(
        "generated harbour: {} rooms, {} characters, {} items",
        world.room_count(),
        demo.characters.len(),
        demo.items.len()
    );
    Ok(demo)
}

/// Where the sloop is launched: a few cables north of the quay.
fn anchorage(config: &DemoConfig) -> Vec3 {
    Vec3::new(1.0, (config.height + 4) as f64, 0.0)
}

fn generate_town(
    world: &mut GameWorld,
    config: &DemoConfig,
    expanse: EntityId,
) -> Result<(Vec<EntityId>, Vec<EntityId>), WorldError> {
    let mut rooms = Vec::new();
    let mut coast = Vec::new();
    for y in 0..config.height {
        for x in 0..config.width {
            let id = world.create_room(HARBOUR_ZONE, &format!("r{x}_{y}"), Some(Coords::new(x, y, 0)))?;
            let quay = y == config.height - 1;
            if let Some(mut room) = world.get_mut::<Room>(id) {
                room.terrain = if quay { "quay" } else { "street" }.to_string();
                room.title = if quay { "On the quay" } else { "In a narrow street" }.to_string();
                room.interior = false;
                if quay {
                    room.expanse = Some(expanse);
                }
            }
            rooms.push(id);
            if quay {
                coast.push(id);
            }
        }
    }

    for y in 0..config.height {
        for x in 0..config.width {
            let Some(here) = grid_room(&rooms, config, x, y) else {
                continue;
            };
            if let Some(east) = grid_room(&rooms, config, x + 1, y) {
                world.link_rooms(here, Direction::East, east)?;
            }
            if let Some(north) = grid_room(&rooms, config, x, y + 1) {
                world.link_rooms(here, Direction::North, north)?;
            }
        }
    }
    Ok((rooms, coast))
}

fn generate_bay(
    world: &mut GameWorld,
    config: &DemoConfig,
    anchorage: Vec3,
    rng: &mut impl Rng,
    expanse: EntityId,
    quay: &[EntityId],
) -> Result<(), WorldError> {
    let mut bay = world.get_mut::<Expanse>(expanse).ok_or(WorldError::UnknownEntity(expanse))?;

    for (x, room) in quay.iter().enumerate() {
        bay.add_coast(x as i32, config.height - 1, *room);
    }

    // Reefs stay clear of the sloop's berth.
    let mut placed = 0;
    let mut attempts = 0;
    while placed < config.reefs && attempts < config.reefs * 20 {
        attempts += 1;
        let x = rng.gen_range(-4..config.width + 12);
        let y = rng.gen_range(config.height + 1..config.height + 14);
        let point = Vec3::new(x as f64, y as f64, 0.0);
        if point.distance(&anchorage) < 5.0 || bay.obstacles.contains_key(&(x, y)) {
            continue;
        }
        bay.add_obstacle(x, y, "reef");
        placed += 1;
    }

    for _ in 0..2 {
        let origin = Vec3::new(
            rng.gen_range(-10.0..(config.width + 10) as f64),
            rng.gen_range(config.height as f64..(config.height + 20) as f64),
            0.0,
        );
        bay.winds.push(Wind {
            position: origin,
            velocity: Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), 0.0),
            length: rng.gen_range(5.0..15.0),
        });
    }
    Ok(())
}

/// Three rooms in a row: the stern with the rudder, the mast with the sail
/// and the bow with the gangway.
pub fn sloop_model() -> ShipModel {
    let mut model = ShipModel {
        key: "sloop".into(),
        name: "a sloop".into(),
        ..ShipModel::default()
    };
    let rooms = [
        (Coords::new(0, 0, 0), "stern", "At the stern"),
        (Coords::new(0, 1, 0), "mast", "By the mast"),
        (Coords::new(0, 2, 0), "bow", "At the bow"),
    ];
    for (offset, mnemonic, title) in rooms {
        model.rooms.insert(
            offset,
            ModelRoom {
                mnemonic: mnemonic.into(),
                title: title.into(),
                description: String::new(),
            },
        );
    }
    for (aft, fore) in [(rooms[0].0, rooms[1].0), (rooms[1].0, rooms[2].0)] {
        model.exits.push(ModelExit {
            from: aft,
            direction: Direction::North,
            to: fore,
        });
        model.exits.push(ModelExit {
            from: fore,
            direction: Direction::South,
            to: aft,
        });
    }
    model.elements = vec![
        Mounted {
            room: rooms[0].0,
            element: Element::Rudder(Rudder::default()),
        },
        Mounted {
            room: rooms[1].0,
            element: Element::Sail(Sail::default()),
        },
        Mounted {
            room: rooms[2].0,
            element: Element::Gangway { lowered: false },
        },
    ];
    model
}

/// Spawns the characters with their accounts and belongings. The first one
/// is the captain, aboard by the mast and an administrator.
fn generate_people(
    world: &mut GameWorld,
    config: &DemoConfig,
    rng: &mut impl Rng,
    rooms: &[EntityId],
    mast: EntityId,
) -> Result<(Vec<EntityId>, Vec<EntityId>), WorldError> {
    let mut characters = Vec::new();
    let mut items = Vec::new();

    for n in 0..config.characters.max(1) {
        let name = generate_name(rng);
        let account = world.spawn(Account {
            name: format!("player{n}"),
            email: format!("player{n}@harbour.test"),
            characters: Vec::new(),
        })?;
        let mut character = Character::new(name);
        character.account = Some(account);
        let id = world.spawn(character)?;
        if let Some(mut a) = world.get_mut::<Account>(account) {
            a.characters.push(id);
        }

        let room = if n == 0 {
            mast
        } else {
            rooms[rng.gen_range(0..rooms.len())]
        };
        world.place_character(id, room)?;

        for _ in 0..config.items_per_character {
            let (prototype, weight) = generate_item(rng);
            let item = world.spawn(Item {
                prototype: prototype.to_string(),
                name: format!("a {prototype}"),
                weight,
                holder: Some(id),
            })?;
            if let Some(mut c) = world.get_mut::<Character>(id) {
                c.inventory.push(item);
            }
            items.push(item);
        }
        characters.push(id);
    }

    if let Some(groups) = world.singleton_id(PermissionGroups::TYPE_NAME) {
        if let Some(mut groups) = world.get_mut::<PermissionGroups>(groups) {
            groups.members.insert(characters[0], "administrator".to_string());
        }
    }
    Ok((characters, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kassie_logic::pathfinding::{find_path, RoomGraph};

    #[test]
    fn test_demo_is_seeded() {
        let config = DemoConfig::default();
        let mut a = GameWorld::new();
        let mut b = GameWorld::new();
        generate_demo(&mut a, &config).unwrap();
        generate_demo(&mut b, &config).unwrap();
        let ids = a.live_ids();
        assert_eq!(ids, b.live_ids());
        for id in ids {
            assert_eq!(a.extract(id), b.extract(id));
        }
    }

    #[test]
    fn test_town_is_connected() {
        let config = DemoConfig::default();
        let mut world = GameWorld::new();
        let demo = generate_demo(&mut world, &config).unwrap();
        let from = demo.room_at(&config, 0, 0).unwrap();
        let to = demo.room_at(&config, config.width - 1, config.height - 1).unwrap();
        let path = find_path(&world, from, to).unwrap();
        assert!(path.is_contiguous());
        assert_eq!(path.destination(), Some(to));
        assert!(path.is_continuous());
        assert_eq!(world.room_by_key(HARBOUR_ZONE, "r0_0"), Some(from));
        assert!(world.accepts_discontinuous(to));
    }

    #[test]
    fn test_captain_is_aboard() {
        let mut world = GameWorld::new();
        let demo = generate_demo(&mut world, &DemoConfig::default()).unwrap();
        let room = world.get::<Character>(demo.captain).unwrap().room.unwrap();
        assert_eq!(world.get::<Room>(room).unwrap().ship, Some(demo.ship));
        let groups = world.singleton::<PermissionGroups>().unwrap();
        assert!(groups.is_in(demo.captain, "builder"));
        let bay = world.get::<Expanse>(demo.expanse).unwrap();
        assert_eq!(bay.coasts.len(), DemoConfig::default().width as usize);
        assert_eq!(bay.winds.len(), 2);
    }
}
