//! The record serialization interface.
//!
//! Every persistable type converts itself to and from a [`Record`], an
//! ordered map of named [`Value`]s. References to other entities are always
//! [`Value::Ref`], so backends can rewrite or resolve them without knowing
//! the type, and shared references survive a round trip by id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use kassie_logic::{Coords, Direction, EntityId, Vec3};

use crate::error::RecordError;
use crate::identity::Kind;

/// A field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Ordered pairs; keys may be any value, references included.
    Map(Vec<(Value, Value)>),
    Ref(EntityId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Every entity referenced by this value, map keys included.
    pub fn collect_refs(&self, into: &mut BTreeSet<EntityId>) {
        match self {
            Value::Ref(id) => {
                into.insert(*id);
            }
            Value::List(items) | Value::Tuple(items) => {
                items.iter().for_each(|v| v.collect_refs(into));
            }
            Value::Map(pairs) => {
                for (k, v) in pairs {
                    k.collect_refs(into);
                    v.collect_refs(into);
                }
            }
            _ => {}
        }
    }

    pub fn refs(&self) -> BTreeSet<EntityId> {
        let mut refs = BTreeSet::new();
        self.collect_refs(&mut refs);
        refs
    }

    /// Replaces every reference `dangling` accepts with `Null`. Map
    /// entries keyed by such a reference are removed. Returns how many
    /// references were cleared.
    pub fn clear_refs(&mut self, dangling: &dyn Fn(EntityId) -> bool) -> usize {
        match self {
            Value::Ref(id) if dangling(*id) => {
                *self = Value::Null;
                1
            }
            // A list loses the element, a tuple keeps its arity.
            Value::List(items) => {
                let before = items.len();
                items.retain(|v| !matches!(v, Value::Ref(id) if dangling(*id)));
                let removed = before - items.len();
                removed + items.iter_mut().map(|v| v.clear_refs(dangling)).sum::<usize>()
            }
            Value::Tuple(items) => items.iter_mut().map(|v| v.clear_refs(dangling)).sum(),
            Value::Map(pairs) => {
                let before = pairs.len();
                pairs.retain(|(k, _)| !k.refs().into_iter().any(dangling));
                let mut cleared = before - pairs.len();
                for (_, v) in pairs.iter_mut() {
                    cleared += v.clear_refs(dangling);
                }
                cleared
            }
            _ => 0,
        }
    }

    /// Looks a key up in a map value.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| matches!(k, Value::Str(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Conversion from a [`Value`]. The error names the expected shape.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, &'static str>;
}

macro_rules! int_value {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        }

        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self, &'static str> {
                match value {
                    Value::Int(i) => <$t>::try_from(*i).map_err(|_| "an integer in range"),
                    _ => Err("an integer"),
                }
            }
        }
    )*};
}

int_value!(i8, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Bool(b) => Ok(*b),
            _ => Err("a boolean"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            _ => Err("a number"),
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            _ => Err("a string"),
        }
    }
}

impl From<EntityId> for Value {
    fn from(v: EntityId) -> Self {
        Value::Ref(v)
    }
}

impl FromValue for EntityId {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Ref(id) => Ok(*id),
            _ => Err("a reference"),
        }
    }
}

impl From<Coords> for Value {
    fn from(c: Coords) -> Self {
        Value::Tuple(vec![c.x.into(), c.y.into(), c.z.into()])
    }
}

impl FromValue for Coords {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Tuple(items) | Value::List(items) if items.len() == 3 => Ok(Coords::new(
                i32::from_value(&items[0])?,
                i32::from_value(&items[1])?,
                i32::from_value(&items[2])?,
            )),
            _ => Err("a coordinate triple"),
        }
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Tuple(vec![v.x.into(), v.y.into(), v.z.into()])
    }
}

impl FromValue for Vec3 {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Tuple(items) | Value::List(items) if items.len() == 3 => Ok(Vec3::new(
                f64::from_value(&items[0])?,
                f64::from_value(&items[1])?,
                f64::from_value(&items[2])?,
            )),
            _ => Err("a vector triple"),
        }
    }
}

impl From<Direction> for Value {
    fn from(d: Direction) -> Self {
        Value::Str(d.name().to_string())
    }
}

impl FromValue for Direction {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Str(s) => s.parse().map_err(|_| "a direction name"),
            _ => Err("a direction name"),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::List(items) | Value::Tuple(items) => items.iter().map(T::from_value).collect(),
            _ => Err("a list"),
        }
    }
}

impl<K: Into<Value>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(m: BTreeMap<K, V>) -> Self {
        Value::Map(m.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Map(pairs) => pairs
                .iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            _ => Err("a map"),
        }
    }
}

/// Named field values of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Required field.
    pub fn req<T: FromValue>(&self, name: &str) -> Result<T, RecordError> {
        let value = self
            .get(name)
            .ok_or_else(|| RecordError::Missing(name.to_string()))?;
        T::from_value(value).map_err(|expected| RecordError::WrongType {
            field: name.to_string(),
            expected,
        })
    }

    /// Optional field: missing and `Null` both give `None`.
    pub fn opt<T: FromValue>(&self, name: &str) -> Result<Option<T>, RecordError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.req(name).map(Some),
        }
    }

    /// Field falling back to its default when missing.
    pub fn or_default<T: FromValue + Default>(&self, name: &str) -> Result<T, RecordError> {
        Ok(self.opt(name)?.unwrap_or_default())
    }

    /// Every entity referenced by any field.
    pub fn refs(&self) -> BTreeSet<EntityId> {
        let mut refs = BTreeSet::new();
        self.fields.values().for_each(|v| v.collect_refs(&mut refs));
        refs
    }

    /// Nulls out references `dangling` accepts, in every field.
    pub fn clear_refs(&mut self, dangling: &dyn Fn(EntityId) -> bool) -> usize {
        self.fields.values_mut().map(|v| v.clear_refs(dangling)).sum()
    }

    /// Drops every field that references an entity `pending` accepts and
    /// returns the dropped field names.
    pub fn drop_fields_referencing(&mut self, pending: impl Fn(EntityId) -> bool) -> Vec<String> {
        let dropped: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, v)| v.refs().into_iter().any(&pending))
            .map(|(k, _)| k.clone())
            .collect();
        for name in &dropped {
            self.fields.remove(name);
        }
        dropped
    }
}

/// A type the persistence layer can store.
pub trait Persistent: Sized + Send + Sync + 'static {
    /// Qualified type name, also the document collection name.
    const TYPE_NAME: &'static str;
    /// Bucket loaded in bulk, also the directory name in files mode.
    const GROUP: &'static str;
    const KIND: Kind = Kind::Identified;

    fn to_record(&self) -> Record;
    fn from_record(record: &Record) -> Result<Self, RecordError>;
}
