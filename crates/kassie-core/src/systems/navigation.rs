//! Navigation system - launches ships, moves them, handles sails
//!
//! Ship physics lives in `kassie_logic::vessel`; this system applies it to
//! the world: rooms follow their ship, messages reach the people aboard,
//! and sail handling is split into a begin step and a deferred finish step.

use kassie_logic::constants::SAIL_HANDLING_DELAY;
use kassie_logic::vessel::{AdvanceOutcome, Vessel};
use kassie_logic::{Coords, EntityId, Vec3};

use crate::components::{
    valid_mnemonic, valid_zone, Character, Expanse, Room, Ship, ShipModel,
};
use crate::error::{NavigationError, WorldError};
use crate::record::Persistent;
use crate::world::GameWorld;

/// Character state while hoisting a sail.
pub const HOISTING: &str = "hoisting_sail";
/// Character state while folding a sail.
pub const FOLDING: &str = "folding_sail";

/// Builds a ship from `model`: one room per model room in the zone `key`,
/// the model's exits and elements, placed at `position`.
pub fn launch_ship(
    world: &mut GameWorld,
    model_id: EntityId,
    key: &str,
    expanse: Option<EntityId>,
    position: Vec3,
) -> Result<EntityId, WorldError> {
    let model = world
        .get::<ShipModel>(model_id)
        .map(|m| (*m).clone())
        .ok_or(WorldError::WrongType {
            id: model_id,
            expected: ShipModel::TYPE_NAME,
        })?;
    let zone = key.to_lowercase();

    // Check every key first so a refused launch leaves nothing behind.
    if !valid_zone(&zone) {
        return Err(WorldError::InvalidZone(zone));
    }
    for template in model.rooms.values() {
        if !valid_mnemonic(&template.mnemonic) {
            return Err(WorldError::InvalidMnemonic(template.mnemonic.clone()));
        }
        if world.room_by_key(&zone, &template.mnemonic).is_some() {
            return Err(WorldError::DuplicateRoom {
                zone,
                mnemonic: template.mnemonic.clone(),
            });
        }
    }

    let mut vessel = Vessel::new(position, model.rooms.keys().copied().collect());
    vessel.elements = model.elements.clone();
    let placed: Vec<(Coords, Vec3)> = vessel.room_positions();
    let ship_id = world.spawn(Ship {
        key: zone.clone(),
        model: Some(model_id),
        rooms: Default::default(),
        expanse,
        vessel,
    })?;

    let mut rooms = std::collections::BTreeMap::new();
    for (offset, at) in placed {
        let Some(template) = model.rooms.get(&offset) else {
            continue;
        };
        let mut room = Room::new(zone.clone(), template.mnemonic.clone()).with_title(template.title.clone());
        room.description = template.description.clone();
        room.terrain = "deck".to_string();
        room.coords = Some(at.round());
        room.ship = Some(ship_id);
        rooms.insert(offset, world.add_room(room)?);
    }
    for exit in &model.exits {
        if let (Some(from), Some(to)) = (rooms.get(&exit.from), rooms.get(&exit.to)) {
            world.add_exit(*from, exit.direction, *to)?;
        }
    }

    if let Some(mut ship) = world.get_mut::<Ship>(ship_id) {
        ship.rooms = rooms;
    }
    if let Some(mut model) = world.get_mut::<ShipModel>(model_id) {
        model.ships.push(ship_id);
    }
    log::info!("launched {zone} from {}", model.key);
    Ok(ship_id)
}

/// Advances one ship by `dt` seconds and moves its rooms along.
pub fn ship_tick(world: &mut GameWorld, ship_id: EntityId, dt: f64) -> Result<AdvanceOutcome, WorldError> {
    let (outcome, positions, rooms) = {
        let mut ship = world.get_mut::<Ship>(ship_id).ok_or(WorldError::WrongType {
            id: ship_id,
            expected: Ship::TYPE_NAME,
        })?;
        let expanse = ship.expanse.and_then(|e| world.get::<Expanse>(e));
        let outcome = ship.vessel.advance(dt, expanse.as_deref());
        (outcome, ship.vessel.room_positions(), ship.rooms.clone())
    };

    for (offset, at) in positions {
        if let Some(room) = rooms.get(&offset) {
            world.set_room_coords(*room, Some(at.round()))?;
        }
    }
    for message in &outcome.messages {
        for room in rooms.values() {
            world.send_to_room(*room, message, None);
        }
    }
    if outcome.collided {
        log::debug!("ship {ship_id} collided: {:?}", outcome.impact);
    }
    Ok(outcome)
}

/// Trims every hoisted sail of a ship to the wind, as a crew would.
pub fn trim_sails(world: &mut GameWorld, ship_id: EntityId) {
    let Some(mut ship) = world.get_mut::<Ship>(ship_id) else {
        return;
    };
    let wind = ship
        .expanse
        .and_then(|e| world.get::<Expanse>(e))
        .map(|e| e.wind_at(ship.vessel.position()))
        .unwrap_or(Vec3::ZERO);
    let heading = ship.vessel.kinematics.heading_degrees();
    let offsets: Vec<Coords> = ship.vessel.elements.iter().map(|m| m.room).collect();
    for offset in offsets {
        if let Some(sail) = ship.vessel.sail_mut(offset) {
            if sail.hoisted {
                sail.orient(heading, wind);
            }
        }
    }
}

/// The ship a character stands on, the room, and its offset in the ship.
fn aboard(world: &GameWorld, character: EntityId) -> Result<(EntityId, EntityId, Coords), NavigationError> {
    let room = world
        .get::<Character>(character)
        .and_then(|c| c.room)
        .ok_or(NavigationError::NotAboard(character))?;
    let ship = world
        .get::<Room>(room)
        .and_then(|r| r.ship)
        .ok_or(NavigationError::NotAboard(character))?;
    let offset = world
        .get::<Ship>(ship)
        .and_then(|s| s.offset_of(room))
        .ok_or(NavigationError::NotAboard(character))?;
    Ok((ship, room, offset))
}

fn sail_hoisted(world: &GameWorld, ship: EntityId, offset: Coords) -> Result<bool, NavigationError> {
    let mut s = world.get_mut::<Ship>(ship).ok_or(NavigationError::NotAboard(ship))?;
    let hoisted = s.vessel.sail_mut(offset).map(|sail| sail.hoisted);
    hoisted.ok_or(NavigationError::NoSail)
}

fn set_sail(world: &mut GameWorld, ship: EntityId, offset: Coords, hoisted: bool) -> bool {
    let Some(mut s) = world.get_mut::<Ship>(ship) else {
        return false;
    };
    match s.vessel.sail_mut(offset) {
        Some(sail) => {
            sail.hoisted = hoisted;
            true
        }
        None => false,
    }
}

fn start_action(world: &mut GameWorld, character: EntityId, state: &str, message: &str) -> Result<(), NavigationError> {
    let mut c = world.get_mut::<Character>(character).ok_or(NavigationError::NotAboard(character))?;
    c.add_state(state);
    c.send(message);
    Ok(())
}

/// Begins hoisting the sail in the character's room. Returns the room and
/// the delay after which [`finish_hoist`] must run.
pub fn begin_hoist(world: &mut GameWorld, character: EntityId) -> Result<(EntityId, f64), NavigationError> {
    let (ship, room, offset) = aboard(world, character)?;
    if sail_hoisted(world, ship, offset)? {
        return Err(NavigationError::AlreadyHoisted);
    }
    start_action(world, character, HOISTING, "You begin to hoist the sail.")?;
    Ok((room, SAIL_HANDLING_DELAY))
}

/// Completes a hoist. Returns `false`, doing nothing, when the character
/// stopped hoisting meanwhile.
pub fn finish_hoist(world: &mut GameWorld, character: EntityId, room: EntityId) -> bool {
    finish(world, character, room, HOISTING, true, "The sail is hoisted.")
}

/// Begins folding the sail in the character's room.
pub fn begin_fold(world: &mut GameWorld, character: EntityId) -> Result<(EntityId, f64), NavigationError> {
    let (ship, room, offset) = aboard(world, character)?;
    if !sail_hoisted(world, ship, offset)? {
        return Err(NavigationError::AlreadyFolded);
    }
    start_action(world, character, FOLDING, "You begin to fold the sail.")?;
    Ok((room, SAIL_HANDLING_DELAY))
}

pub fn finish_fold(world: &mut GameWorld, character: EntityId, room: EntityId) -> bool {
    finish(world, character, room, FOLDING, false, "The sail is folded.")
}

fn finish(world: &mut GameWorld, character: EntityId, room: EntityId, state: &str, hoisted: bool, message: &str) -> bool {
    let still_busy = world
        .get_mut::<Character>(character)
        .is_some_and(|mut c| c.remove_state(state));
    if !still_busy {
        return false;
    }
    let Some(ship) = world.get::<Room>(room).and_then(|r| r.ship) else {
        return false;
    };
    let Some(offset) = world.get::<Ship>(ship).and_then(|s| s.offset_of(room)) else {
        return false;
    };
    if !set_sail(world, ship, offset, hoisted) {
        return false;
    }
    world.send_to_room(room, message, None);
    true
}

/// Abandons any sail handling in progress.
pub fn interrupt(world: &mut GameWorld, character: EntityId) -> bool {
    world.get_mut::<Character>(character).is_some_and(|mut c| {
        let hoisting = c.remove_state(HOISTING);
        let folding = c.remove_state(FOLDING);
        hoisting || folding
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ModelExit, ModelRoom};
    use kassie_logic::pathfinding::RoomGraph;
    use kassie_logic::sailing::{Element, Rudder, Sail};
    use kassie_logic::vessel::Mounted;
    use kassie_logic::Direction;

    fn sloop() -> ShipModel {
        let mut model = ShipModel {
            key: "sloop".into(),
            name: "a sloop".into(),
            ..ShipModel::default()
        };
        for (offset, mnemonic) in [(Coords::new(0, 0, 0), "1"), (Coords::new(0, 1, 0), "2")] {
            model.rooms.insert(
                offset,
                ModelRoom {
                    mnemonic: mnemonic.into(),
                    title: "On the deck".into(),
                    description: String::new(),
                },
            );
        }
        model.exits.push(ModelExit {
            from: Coords::new(0, 0, 0),
            direction: Direction::North,
            to: Coords::new(0, 1, 0),
        });
        model.exits.push(ModelExit {
            from: Coords::new(0, 1, 0),
            direction: Direction::South,
            to: Coords::new(0, 0, 0),
        });
        model.elements.push(Mounted {
            room: Coords::new(0, 1, 0),
            element: Element::Sail(Sail::default()),
        });
        model.elements.push(Mounted {
            room: Coords::new(0, 0, 0),
            element: Element::Rudder(Rudder::default()),
        });
        model
    }

    fn launched() -> (GameWorld, EntityId, EntityId) {
        let mut world = GameWorld::new();
        let model = world.spawn(sloop()).unwrap();
        let ship = launch_ship(&mut world, model, "sloop_1", None, Vec3::new(10.0, 10.0, 0.0)).unwrap();
        (world, model, ship)
    }

    #[test]
    fn test_launch_copies_the_model() {
        let (world, model, ship) = launched();
        let s = world.get::<Ship>(ship).unwrap();
        assert_eq!(s.rooms.len(), 2);
        assert_eq!(s.vessel.elements.len(), 2);
        let bow = s.room_at_offset(Coords::new(0, 1, 0)).unwrap();
        let stern = s.room_at_offset(Coords::new(0, 0, 0)).unwrap();
        assert_eq!(world.room_by_key("sloop_1", "2"), Some(bow));
        assert_eq!(world.get::<Room>(bow).unwrap().ship, Some(ship));
        assert!(world.get::<Room>(stern).unwrap().exit(Direction::North).is_some());
        assert_eq!(world.get::<ShipModel>(model).unwrap().ships, vec![ship]);
    }

    #[test]
    fn test_launch_refuses_a_used_zone() {
        let (mut world, model, _) = launched();
        let before = world.len();
        let err = launch_ship(&mut world, model, "sloop_1", None, Vec3::ZERO).unwrap_err();
        assert!(matches!(err, WorldError::DuplicateRoom { .. }));
        assert_eq!(world.len(), before);
    }

    #[test]
    fn test_rooms_follow_the_ship() {
        let (mut world, _, ship) = launched();
        {
            let mut s = world.get_mut::<Ship>(ship).unwrap();
            s.vessel.kinematics.velocity = Vec3::new(2.0, 0.0, 0.0);
            s.vessel.kinematics.drag = 0.0;
        }
        ship_tick(&mut world, ship, 1.0).unwrap();
        let bow = world.get::<Ship>(ship).unwrap().room_at_offset(Coords::new(0, 1, 0)).unwrap();
        // Heading east, the bow is one unit east of the root at (12, 10).
        assert_eq!(world.get::<Room>(bow).unwrap().coords, Some(Coords::new(13, 10, 0)));
        assert_eq!(world.room_at(Coords::new(13, 10, 0)), Some(bow));
    }

    #[test]
    fn test_hoist_completes_after_delay() {
        let (mut world, _, ship) = launched();
        let bow = world.get::<Ship>(ship).unwrap().room_at_offset(Coords::new(0, 1, 0)).unwrap();
        let hero = world.spawn(Character::new("Anja")).unwrap();
        world.place_character(hero, bow).unwrap();

        let (room, delay) = begin_hoist(&mut world, hero).unwrap();
        assert_eq!(delay, SAIL_HANDLING_DELAY);
        assert!(world.get::<Character>(hero).unwrap().has_state(HOISTING));
        assert!(finish_hoist(&mut world, hero, room));
        assert!(world.get::<Ship>(ship).unwrap().vessel.sails()[0].hoisted);
        assert!(matches!(begin_hoist(&mut world, hero), Err(NavigationError::AlreadyHoisted)));
    }

    #[test]
    fn test_interrupted_hoist_does_nothing() {
        let (mut world, _, ship) = launched();
        let bow = world.get::<Ship>(ship).unwrap().room_at_offset(Coords::new(0, 1, 0)).unwrap();
        let hero = world.spawn(Character::new("Anja")).unwrap();
        world.place_character(hero, bow).unwrap();

        let (room, _) = begin_hoist(&mut world, hero).unwrap();
        assert!(interrupt(&mut world, hero));
        assert!(!finish_hoist(&mut world, hero, room));
        assert!(!world.get::<Ship>(ship).unwrap().vessel.sails()[0].hoisted);
    }

    #[test]
    fn test_no_sail_in_the_stern() {
        let (mut world, _, ship) = launched();
        let stern = world.get::<Ship>(ship).unwrap().room_at_offset(Coords::new(0, 0, 0)).unwrap();
        let hero = world.spawn(Character::new("Anja")).unwrap();
        world.place_character(hero, stern).unwrap();
        assert!(matches!(begin_hoist(&mut world, hero), Err(NavigationError::NoSail)));

        let ashore = world.spawn(Character::new("Bert")).unwrap();
        assert!(matches!(begin_hoist(&mut world, ashore), Err(NavigationError::NotAboard(_))));
    }
}
