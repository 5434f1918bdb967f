//! Ship models, ships and expanses.

use std::collections::BTreeMap;

use kassie_logic::expanse::Expanse;
use kassie_logic::sailing::{Element, Oars, Rudder, Sail, Wind};
use kassie_logic::vehicle::Kinematics;
use kassie_logic::vessel::{Mounted, Vessel};
use kassie_logic::{Coords, Direction, EntityId, Vec3};

use crate::error::RecordError;
use crate::record::{FromValue, Persistent, Record, Value};

/// Template of one ship room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRoom {
    pub mnemonic: String,
    pub title: String,
    pub description: String,
}

/// Exit between two rooms of a model, by offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelExit {
    pub from: Coords,
    pub direction: Direction,
    pub to: Coords,
}

/// Blueprint ships are launched from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipModel {
    pub key: String,
    pub name: String,
    /// Room templates by offset in the ship frame.
    pub rooms: BTreeMap<Coords, ModelRoom>,
    pub exits: Vec<ModelExit>,
    pub elements: Vec<Mounted>,
    /// Ships launched from this model.
    pub ships: Vec<EntityId>,
}

/// A launched ship.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ship {
    pub key: String,
    pub model: Option<EntityId>,
    /// The ship's rooms by offset in the ship frame.
    pub rooms: BTreeMap<Coords, EntityId>,
    pub expanse: Option<EntityId>,
    pub vessel: Vessel,
}

impl Ship {
    pub fn room_at_offset(&self, offset: Coords) -> Option<EntityId> {
        self.rooms.get(&offset).copied()
    }

    pub fn offset_of(&self, room: EntityId) -> Option<Coords> {
        self.rooms.iter().find(|(_, r)| **r == room).map(|(c, _)| *c)
    }
}

fn element_to_value(mounted: &Mounted) -> Value {
    let mut pairs: Vec<(Value, Value)> = vec![
        ("room".into(), mounted.room.into()),
        ("type".into(), mounted.element.type_name().into()),
    ];
    match &mounted.element {
        Element::Sail(sail) => {
            pairs.push(("orientation".into(), sail.orientation.into()));
            pairs.push(("hoisted".into(), sail.hoisted.into()));
        }
        Element::Rudder(rudder) => {
            pairs.push(("orientation".into(), rudder.orientation.into()));
            pairs.push(("held_by".into(), rudder.held_by.into()));
        }
        Element::Gangway { lowered } => {
            pairs.push(("lowered".into(), (*lowered).into()));
        }
        Element::Oars(oars) => {
            pairs.push(("speed".into(), oars.speed.into()));
        }
    }
    Value::Map(pairs)
}

fn element_from_value(value: &Value) -> Result<Mounted, &'static str> {
    let field = |name: &str| value.lookup(name).ok_or("an element");
    let element = match String::from_value(field("type")?)?.as_str() {
        "sail" => Element::Sail(Sail {
            orientation: f64::from_value(field("orientation")?)?,
            hoisted: bool::from_value(field("hoisted")?)?,
        }),
        "rudder" => Element::Rudder(Rudder {
            orientation: i8::from_value(field("orientation")?)?,
            held_by: Option::<EntityId>::from_value(field("held_by")?)?,
        }),
        "gangway" => Element::Gangway {
            lowered: bool::from_value(field("lowered")?)?,
        },
        "oars" => Element::Oars(Oars {
            speed: i8::from_value(field("speed")?)?,
        }),
        _ => return Err("a known element type"),
    };
    Ok(Mounted {
        room: Coords::from_value(field("room")?)?,
        element,
    })
}

fn elements_from(record: &Record, name: &str) -> Result<Vec<Mounted>, RecordError> {
    match record.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::List(items)) => items
            .iter()
            .map(|v| {
                element_from_value(v).map_err(|expected| RecordError::WrongType {
                    field: name.to_string(),
                    expected,
                })
            })
            .collect(),
        Some(_) => Err(RecordError::WrongType {
            field: name.to_string(),
            expected: "a list",
        }),
    }
}

fn pairs_of<'a>(record: &'a Record, name: &str) -> Result<&'a [(Value, Value)], RecordError> {
    match record.get(name) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Map(pairs)) => Ok(pairs),
        Some(_) => Err(RecordError::WrongType {
            field: name.to_string(),
            expected: "a map",
        }),
    }
}

fn wrong(field: &str) -> impl Fn(&'static str) -> RecordError + '_ {
    move |expected| RecordError::WrongType {
        field: field.to_string(),
        expected,
    }
}

impl Persistent for ShipModel {
    const TYPE_NAME: &'static str = "navigation.ShipModel";
    const GROUP: &'static str = "ship_models";

    fn to_record(&self) -> Record {
        let rooms = Value::Map(
            self.rooms
                .iter()
                .map(|(offset, room)| {
                    let template = Value::Map(vec![
                        ("mnemonic".into(), room.mnemonic.as_str().into()),
                        ("title".into(), room.title.as_str().into()),
                        ("description".into(), room.description.as_str().into()),
                    ]);
                    (Value::from(*offset), template)
                })
                .collect(),
        );
        let exits: Vec<Value> = self
            .exits
            .iter()
            .map(|e| Value::Tuple(vec![e.from.into(), e.direction.into(), e.to.into()]))
            .collect();
        Record::new()
            .with("key", self.key.as_str())
            .with("name", self.name.as_str())
            .with("rooms", rooms)
            .with("exits", exits)
            .with(
                "elements",
                self.elements.iter().map(element_to_value).collect::<Vec<_>>(),
            )
            .with("ships", self.ships.clone())
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let mut rooms = BTreeMap::new();
        for (offset, template) in pairs_of(record, "rooms")? {
            let text = |name: &str| -> Result<String, RecordError> {
                template
                    .lookup(name)
                    .map(String::from_value)
                    .unwrap_or_else(|| Ok(String::new()))
                    .map_err(wrong("rooms"))
            };
            rooms.insert(
                Coords::from_value(offset).map_err(wrong("rooms"))?,
                ModelRoom {
                    mnemonic: text("mnemonic")?,
                    title: text("title")?,
                    description: text("description")?,
                },
            );
        }

        let mut exits = Vec::new();
        if let Some(Value::List(items)) = record.get("exits") {
            for item in items {
                let Value::Tuple(parts) = item else {
                    return Err(wrong("exits")("a triple"));
                };
                if parts.len() != 3 {
                    return Err(wrong("exits")("a triple"));
                }
                exits.push(ModelExit {
                    from: Coords::from_value(&parts[0]).map_err(wrong("exits"))?,
                    direction: Direction::from_value(&parts[1]).map_err(wrong("exits"))?,
                    to: Coords::from_value(&parts[2]).map_err(wrong("exits"))?,
                });
            }
        }

        Ok(Self {
            key: record.req("key")?,
            name: record.or_default("name")?,
            rooms,
            exits,
            elements: elements_from(record, "elements")?,
            ships: record.or_default("ships")?,
        })
    }
}

impl Persistent for Ship {
    const TYPE_NAME: &'static str = "navigation.Ship";
    const GROUP: &'static str = "ships";

    fn to_record(&self) -> Record {
        let k = &self.vessel.kinematics;
        Record::new()
            .with("key", self.key.as_str())
            .with("model", self.model)
            .with("rooms", self.rooms.clone())
            .with("expanse", self.expanse)
            .with("position", k.position)
            .with("velocity", k.velocity)
            .with("acceleration", k.acceleration)
            .with("heading", k.heading)
            .with("mass", k.mass)
            .with("drag", k.drag)
            .with(
                "elements",
                self.vessel
                    .elements
                    .iter()
                    .map(element_to_value)
                    .collect::<Vec<_>>(),
            )
            .with("immobilized", self.vessel.immobilized)
            .with("in_collision", self.vessel.in_collision)
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let rooms: BTreeMap<Coords, EntityId> = record.or_default("rooms")?;
        let defaults = Kinematics::default();
        let kinematics = Kinematics {
            position: record.or_default("position")?,
            velocity: record.or_default("velocity")?,
            acceleration: record.or_default("acceleration")?,
            heading: record.opt("heading")?.unwrap_or(defaults.heading),
            mass: record.opt("mass")?.unwrap_or(defaults.mass),
            drag: record.opt("drag")?.unwrap_or(defaults.drag),
        };
        let vessel = Vessel {
            kinematics,
            offsets: rooms.keys().copied().collect(),
            elements: elements_from(record, "elements")?,
            immobilized: record.or_default("immobilized")?,
            in_collision: record.or_default("in_collision")?,
        };
        Ok(Self {
            key: record.req("key")?,
            model: record.opt("model")?,
            rooms,
            expanse: record.opt("expanse")?,
            vessel,
        })
    }
}

fn point_value(point: (i32, i32)) -> Value {
    Value::Tuple(vec![point.0.into(), point.1.into()])
}

fn point_from(value: &Value) -> Result<(i32, i32), &'static str> {
    match value {
        Value::Tuple(items) | Value::List(items) if items.len() == 2 => {
            Ok((i32::from_value(&items[0])?, i32::from_value(&items[1])?))
        }
        _ => Err("a point pair"),
    }
}

impl Persistent for Expanse {
    const TYPE_NAME: &'static str = "navigation.Expanse";
    const GROUP: &'static str = "expanses";

    fn to_record(&self) -> Record {
        let obstacles = Value::Map(
            self.obstacles
                .iter()
                .map(|(p, name)| (point_value(*p), name.as_str().into()))
                .collect(),
        );
        let coasts = Value::Map(
            self.coasts
                .iter()
                .map(|(p, room)| (point_value(*p), (*room).into()))
                .collect(),
        );
        let winds: Vec<Value> = self
            .winds
            .iter()
            .map(|w| {
                Value::Map(vec![
                    ("position".into(), w.position.into()),
                    ("velocity".into(), w.velocity.into()),
                    ("length".into(), w.length.into()),
                ])
            })
            .collect();
        Record::new()
            .with("key", self.key.as_str())
            .with("altitude", self.altitude)
            .with("obstacles", obstacles)
            .with("coasts", coasts)
            .with("winds", winds)
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let mut expanse = Expanse::new(record.req::<String>("key")?, record.or_default("altitude")?);
        for (point, name) in pairs_of(record, "obstacles")? {
            let (x, y) = point_from(point).map_err(wrong("obstacles"))?;
            expanse.add_obstacle(x, y, String::from_value(name).map_err(wrong("obstacles"))?);
        }
        for (point, room) in pairs_of(record, "coasts")? {
            let (x, y) = point_from(point).map_err(wrong("coasts"))?;
            expanse.add_coast(x, y, EntityId::from_value(room).map_err(wrong("coasts"))?);
        }
        if let Some(Value::List(items)) = record.get("winds") {
            for item in items {
                let field = |name: &str| item.lookup(name).ok_or("a wind");
                let wind = (|| -> Result<Wind, &'static str> {
                    Ok(Wind {
                        position: Vec3::from_value(field("position")?)?,
                        velocity: Vec3::from_value(field("velocity")?)?,
                        length: f64::from_value(field("length")?)?,
                    })
                })()
                .map_err(wrong("winds"))?;
                expanse.winds.push(wind);
            }
        }
        Ok(expanse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ship_record_roundtrip() {
        let mut ship = Ship {
            key: "sloop_1".to_string(),
            model: Some(EntityId(2)),
            expanse: Some(EntityId(3)),
            ..Ship::default()
        };
        ship.rooms.insert(Coords::new(0, 0, 0), EntityId(10));
        ship.rooms.insert(Coords::new(0, 1, 0), EntityId(11));
        ship.vessel.offsets = ship.rooms.keys().copied().collect();
        ship.vessel.kinematics.position = Vec3::new(4.0, 5.0, 0.0);
        ship.vessel.elements.push(Mounted {
            room: Coords::new(0, 1, 0),
            element: Element::Sail(Sail::default()),
        });
        ship.vessel.elements.push(Mounted {
            room: Coords::new(0, 0, 0),
            element: Element::Rudder(Rudder {
                orientation: -2,
                held_by: Some(EntityId(40)),
            }),
        });

        let back = Ship::from_record(&ship.to_record()).unwrap();
        assert_eq!(back, ship);
        assert_eq!(back.offset_of(EntityId(11)), Some(Coords::new(0, 1, 0)));
    }

    #[test]
    fn test_expanse_record_roundtrip() {
        let mut expanse = Expanse::new("bay", 0);
        expanse.add_obstacle(4, -2, "reef");
        expanse.add_coast(0, 0, EntityId(8));
        expanse.winds.push(Wind {
            position: Vec3::ZERO,
            velocity: Vec3::new(1.0, 0.5, 0.0),
            length: 10.0,
        });
        let back = Expanse::from_record(&expanse.to_record()).unwrap();
        assert_eq!(back, expanse);
    }

    #[test]
    fn test_model_record_roundtrip() {
        let mut model = ShipModel {
            key: "sloop".to_string(),
            name: "a sloop".to_string(),
            ..ShipModel::default()
        };
        model.rooms.insert(
            Coords::new(0, 0, 0),
            ModelRoom {
                mnemonic: "deck".to_string(),
                ..ModelRoom::default()
            },
        );
        model.rooms.insert(
            Coords::new(0, 1, 0),
            ModelRoom {
                mnemonic: "bow".to_string(),
                ..ModelRoom::default()
            },
        );
        model.exits.push(ModelExit {
            from: Coords::new(0, 0, 0),
            direction: Direction::North,
            to: Coords::new(0, 1, 0),
        });
        model.elements.push(Mounted {
            room: Coords::new(0, 0, 0),
            element: Element::Gangway { lowered: true },
        });
        let back = ShipModel::from_record(&model.to_record()).unwrap();
        assert_eq!(back, model);
    }
}
