//! Records as JSON documents.
//!
//! References become `{"$ref": [collection, id]}` and tuples
//! `{"$tuple": [...]}`. Map keys go through [`super::keys`], so any plain
//! key starting with `$` is quoted and cannot clash with these markers.

use serde_json::{json, Map, Number, Value as Json};

use kassie_logic::EntityId;

use super::keys::{decode_key, encode_key, Literal};
use super::store::DocId;
use crate::error::RecordError;
use crate::record::{Record, Value};

const REF: &str = "$ref";
const TUPLE: &str = "$tuple";

/// Encodes a record. `locate` gives the collection and document of a
/// referenced entity; references it cannot place are written as null.
pub fn encode_record(record: &Record, locate: &dyn Fn(EntityId) -> Option<(String, DocId)>) -> Json {
    let fields: Map<String, Json> = record
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value, locate)))
        .collect();
    Json::Object(fields)
}

pub fn encode_value(value: &Value, locate: &dyn Fn(EntityId) -> Option<(String, DocId)>) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => Json::Number(n),
            None => {
                log::warn!("cannot store non-finite number {f}, writing null");
                Json::Null
            }
        },
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(|v| encode_value(v, locate)).collect()),
        Value::Tuple(items) => {
            json!({ TUPLE: items.iter().map(|v| encode_value(v, locate)).collect::<Vec<_>>() })
        }
        Value::Map(pairs) => {
            let mut object = Map::new();
            for (key, value) in pairs {
                match encode_key(key, locate) {
                    Ok(key) => {
                        object.insert(key, encode_value(value, locate));
                    }
                    Err(e) => log::warn!("dropping map entry: {e}"),
                }
            }
            Json::Object(object)
        }
        Value::Ref(id) => match locate(*id) {
            Some((collection, doc)) => json!({ REF: [collection, doc.0] }),
            None => {
                log::warn!("reference to {id} has no document, writing null");
                Json::Null
            }
        },
    }
}

/// Decodes a document. `resolve` turns a stored reference into a live
/// entity, loading it if needed.
pub fn decode_record(
    document: &Json,
    resolve: &mut dyn FnMut(&str, DocId) -> Option<EntityId>,
) -> Result<Record, RecordError> {
    let Json::Object(fields) = document else {
        return Err(RecordError::Invalid {
            field: String::new(),
            reason: "a document must be an object".to_string(),
        });
    };
    let mut record = Record::new();
    for (name, value) in fields {
        record.set(name, decode_value(value, resolve));
    }
    Ok(record)
}

pub fn decode_value(json: &Json, resolve: &mut dyn FnMut(&str, DocId) -> Option<EntityId>) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        Json::String(s) => Value::Str(s.clone()),
        // A dangling reference is dropped from a list rather than nulled.
        Json::Array(items) => Value::List(
            items
                .iter()
                .filter_map(|v| {
                    let value = decode_value(v, resolve);
                    (!(value == Value::Null && is_ref_marker(v))).then_some(value)
                })
                .collect(),
        ),
        Json::Object(object) => {
            if let Some(target) = marker(object, REF) {
                return decode_ref(target, resolve);
            }
            if let Some(Json::Array(items)) = marker(object, TUPLE) {
                return Value::Tuple(items.iter().map(|v| decode_value(v, resolve)).collect());
            }
            let mut pairs = Vec::with_capacity(object.len());
            for (k, v) in object {
                let literal = decode_key(k);
                let is_ref = matches!(literal, Literal::Ref { .. });
                let key = literal_value(literal, resolve);
                if is_ref && key == Value::Null {
                    continue;
                }
                pairs.push((key, decode_value(v, resolve)));
            }
            Value::Map(pairs)
        }
    }
}

fn is_ref_marker(json: &Json) -> bool {
    json.as_object().is_some_and(|object| marker(object, REF).is_some())
}

fn marker<'a>(object: &'a Map<String, Json>, name: &str) -> Option<&'a Json> {
    if object.len() == 1 {
        object.get(name)
    } else {
        None
    }
}

fn decode_ref(target: &Json, resolve: &mut dyn FnMut(&str, DocId) -> Option<EntityId>) -> Value {
    let parsed = target.as_array().and_then(|pair| match pair.as_slice() {
        [Json::String(collection), id] => id.as_u64().map(|id| (collection.as_str(), DocId(id))),
        _ => None,
    });
    let Some((collection, id)) = parsed else {
        log::warn!("malformed reference {target}");
        return Value::Null;
    };
    resolve_or_null(collection, id, resolve)
}

fn resolve_or_null(
    collection: &str,
    id: DocId,
    resolve: &mut dyn FnMut(&str, DocId) -> Option<EntityId>,
) -> Value {
    match resolve(collection, id) {
        Some(entity) => Value::Ref(entity),
        None => {
            log::warn!("dangling reference to {collection}/{id}");
            Value::Null
        }
    }
}

fn literal_value(literal: Literal, resolve: &mut dyn FnMut(&str, DocId) -> Option<EntityId>) -> Value {
    match literal {
        Literal::None => Value::Null,
        Literal::Bool(b) => Value::Bool(b),
        Literal::Int(i) => Value::Int(i),
        Literal::Float(f) => Value::Float(f),
        Literal::Str(s) => Value::Str(s),
        Literal::Tuple(items) => Value::Tuple(items.into_iter().map(|l| literal_value(l, resolve)).collect()),
        Literal::List(items) => Value::List(items.into_iter().map(|l| literal_value(l, resolve)).collect()),
        Literal::Ref { collection, id } => resolve_or_null(&collection, id, resolve),
    }
}
