//! Characters, the accounts that own them, and the items they carry.

use kassie_logic::EntityId;

use crate::error::RecordError;
use crate::record::{Persistent, Record};

/// A player character or NPC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Character {
    pub name: String,
    pub account: Option<EntityId>,
    /// Current room. Kept in sync with the room's character list.
    pub room: Option<EntityId>,
    pub inventory: Vec<EntityId>,
    /// Ongoing actions, such as `hoisting_sail`.
    pub states: Vec<String>,
    /// Messages received since last read. Never persisted.
    pub inbox: Vec<String>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    pub fn add_state(&mut self, state: &str) {
        if !self.has_state(state) {
            self.states.push(state.to_string());
        }
    }

    /// Removes `state`, returning whether it was there.
    pub fn remove_state(&mut self, state: &str) -> bool {
        let before = self.states.len();
        self.states.retain(|s| s != state);
        self.states.len() != before
    }

    pub fn send(&mut self, message: impl Into<String>) {
        self.inbox.push(message.into());
    }
}

impl Persistent for Character {
    const TYPE_NAME: &'static str = "character.Character";
    const GROUP: &'static str = "characters";

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("account", self.account)
            .with("room", self.room)
            .with("inventory", self.inventory.clone())
            .with("states", self.states.clone())
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            name: record.req("name")?,
            account: record.opt("account")?,
            room: record.opt("room")?,
            inventory: record.or_default("inventory")?,
            states: record.or_default("states")?,
            inbox: Vec::new(),
        })
    }
}

/// A player account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub characters: Vec<EntityId>,
}

impl Persistent for Account {
    const TYPE_NAME: &'static str = "character.Account";
    const GROUP: &'static str = "accounts";

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("email", self.email.as_str())
            .with("characters", self.characters.clone())
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            name: record.req("name")?,
            email: record.or_default("email")?,
            characters: record.or_default("characters")?,
        })
    }
}

/// An object in the world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub prototype: String,
    pub name: String,
    pub weight: f64,
    /// Character or room holding the item.
    pub holder: Option<EntityId>,
}

impl Persistent for Item {
    const TYPE_NAME: &'static str = "object.Item";
    const GROUP: &'static str = "items";

    fn to_record(&self) -> Record {
        Record::new()
            .with("prototype", self.prototype.as_str())
            .with("name", self.name.as_str())
            .with("weight", self.weight)
            .with("holder", self.holder)
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            prototype: record.req("prototype")?,
            name: record.or_default("name")?,
            weight: record.or_default("weight")?,
            holder: record.opt("holder")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_is_transient() {
        let mut hero = Character::new("Anja");
        hero.room = Some(EntityId(3));
        hero.add_state("hoisting_sail");
        hero.send("hello");

        let back = Character::from_record(&hero.to_record()).unwrap();
        assert!(back.inbox.is_empty());
        assert_eq!(back.room, Some(EntityId(3)));
        assert!(back.has_state("hoisting_sail"));
    }

    #[test]
    fn test_states() {
        let mut hero = Character::new("Anja");
        hero.add_state("rowing");
        hero.add_state("rowing");
        assert_eq!(hero.states.len(), 1);
        assert!(hero.remove_state("rowing"));
        assert!(!hero.remove_state("rowing"));
    }
}
