//! Rooms and their exits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kassie_logic::{Coords, Direction, EntityId};

use crate::error::RecordError;
use crate::record::{FromValue, Persistent, Record, Value};

/// A door on an exit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Door {
    pub closed: bool,
    pub locked: bool,
}

/// One of a room's ten exit slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSlot {
    /// Name shown to players, usually the direction.
    pub name: String,
    pub destination: EntityId,
    pub hidden: bool,
    pub door: Option<Door>,
    pub length: f64,
}

impl ExitSlot {
    pub fn new(direction: Direction, destination: EntityId) -> Self {
        Self {
            name: direction.name().to_string(),
            destination,
            hidden: false,
            door: None,
            length: 1.0,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.door.as_ref().is_some_and(|d| d.locked)
    }

    fn to_value(&self) -> Value {
        let door = match &self.door {
            Some(d) => Value::Map(vec![
                ("closed".into(), d.closed.into()),
                ("locked".into(), d.locked.into()),
            ]),
            None => Value::Null,
        };
        Value::Map(vec![
            ("name".into(), self.name.clone().into()),
            ("destination".into(), self.destination.into()),
            ("hidden".into(), self.hidden.into()),
            ("door".into(), door),
            ("length".into(), self.length.into()),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, &'static str> {
        let field = |name: &str| value.lookup(name).ok_or("an exit");
        let door = match value.lookup("door") {
            None | Some(Value::Null) => None,
            Some(d) => Some(Door {
                closed: bool::from_value(d.lookup("closed").ok_or("a door")?)?,
                locked: bool::from_value(d.lookup("locked").ok_or("a door")?)?,
            }),
        };
        Ok(Self {
            name: String::from_value(field("name")?)?,
            destination: EntityId::from_value(field("destination")?)?,
            hidden: bool::from_value(field("hidden")?)?,
            door,
            length: f64::from_value(field("length")?)?,
        })
    }
}

/// A room. `(zone, mnemonic)` is unique across the live world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Room {
    pub zone: String,
    pub mnemonic: String,
    pub title: String,
    pub description: String,
    pub terrain: String,
    pub interior: bool,
    /// `None` for rooms only reachable through the exit graph.
    pub coords: Option<Coords>,
    pub exits: BTreeMap<Direction, ExitSlot>,
    pub characters: Vec<EntityId>,
    /// Items lying on the floor.
    pub items: Vec<EntityId>,
    /// Expanse this room borders, which makes it a coast.
    pub expanse: Option<EntityId>,
    /// Ship this room belongs to.
    pub ship: Option<EntityId>,
}

impl Room {
    pub fn new(zone: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            mnemonic: mnemonic.into(),
            terrain: "road".to_string(),
            ..Self::default()
        }
    }

    pub fn with_coords(mut self, coords: Coords) -> Self {
        self.coords = Some(coords);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.zone, self.mnemonic)
    }

    pub fn exit(&self, direction: Direction) -> Option<&ExitSlot> {
        self.exits.get(&direction)
    }

    pub fn has_character(&self, character: EntityId) -> bool {
        self.characters.contains(&character)
    }
}

impl Persistent for Room {
    const TYPE_NAME: &'static str = "room.Room";
    const GROUP: &'static str = "rooms";

    fn to_record(&self) -> Record {
        let exits = Value::Map(
            self.exits
                .iter()
                .map(|(dir, slot)| (Value::from(*dir), slot.to_value()))
                .collect(),
        );
        Record::new()
            .with("zone", self.zone.as_str())
            .with("mnemonic", self.mnemonic.as_str())
            .with("title", self.title.as_str())
            .with("description", self.description.as_str())
            .with("terrain", self.terrain.as_str())
            .with("interior", self.interior)
            .with("coords", self.coords)
            .with("exits", exits)
            .with("characters", self.characters.clone())
            .with("items", self.items.clone())
            .with("expanse", self.expanse)
            .with("ship", self.ship)
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let mut exits = BTreeMap::new();
        if let Some(Value::Map(pairs)) = record.get("exits") {
            for (dir, slot) in pairs {
                let invalid = |expected| RecordError::WrongType {
                    field: "exits".to_string(),
                    expected,
                };
                let direction = Direction::from_value(dir).map_err(invalid)?;
                exits.insert(direction, ExitSlot::from_value(slot).map_err(invalid)?);
            }
        }
        Ok(Self {
            zone: record.req("zone")?,
            mnemonic: record.req("mnemonic")?,
            title: record.or_default("title")?,
            description: record.or_default("description")?,
            terrain: record.or_default("terrain")?,
            interior: record.or_default("interior")?,
            coords: record.opt("coords")?,
            exits,
            characters: record.or_default("characters")?,
            items: record.or_default("items")?,
            expanse: record.opt("expanse")?,
            ship: record.opt("ship")?,
        })
    }
}

/// Checks a zone name: 3 to 20 characters among `a-z`, `0-9` and `_`.
pub fn valid_zone(zone: &str) -> bool {
    (3..=20).contains(&zone.len()) && zone.bytes().all(valid_key_byte)
}

/// Checks a room mnemonic: 1 to 15 characters among `a-z`, `0-9` and `_`.
pub fn valid_mnemonic(mnemonic: &str) -> bool {
    (1..=15).contains(&mnemonic.len()) && mnemonic.bytes().all(valid_key_byte)
}

fn valid_key_byte(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_record_roundtrip() {
        let mut room = Room::new("harbour", "quay").with_coords(Coords::new(2, 3, 0));
        room.title = "The quay".to_string();
        let mut slot = ExitSlot::new(Direction::North, EntityId(9));
        slot.door = Some(Door {
            closed: true,
            locked: true,
        });
        room.exits.insert(Direction::North, slot);
        room.characters.push(EntityId(20));
        room.expanse = Some(EntityId(30));

        let back = Room::from_record(&room.to_record()).unwrap();
        assert_eq!(back, room);
        assert!(back.exit(Direction::North).unwrap().is_locked());
        assert_eq!(back.key(), "harbour:quay");
    }

    #[test]
    fn test_missing_fields_default() {
        let record = Record::new().with("zone", "harbour").with("mnemonic", "pier");
        let room = Room::from_record(&record).unwrap();
        assert!(room.exits.is_empty());
        assert_eq!(room.coords, None);
        assert!(Room::from_record(&Record::new()).is_err());
    }

    #[test]
    fn test_key_validation() {
        assert!(valid_zone("harbour_2"));
        assert!(!valid_zone("ab"));
        assert!(!valid_zone("Harbour"));
        assert!(!valid_zone("a_very_long_zone_name_x"));
        assert!(valid_mnemonic("1"));
        assert!(!valid_mnemonic(""));
        assert!(!valid_mnemonic("quay-side"));
    }
}
