//! Reversible string encoding of map keys for the document store.
//!
//! Document objects only have string keys, but component maps may be keyed
//! by numbers, tuples, coordinates or entity references. Plain strings stay
//! as they are unless they could be mistaken for an encoded key, in which
//! case they are quoted. Everything else is written in a small literal
//! syntax:
//!
//! | key                | encoded                    |
//! |--------------------|----------------------------|
//! | `"quay"`           | `quay`                     |
//! | `"(odd"`           | `'(odd'`                   |
//! | `3`, `-1.5`        | `3`, `-1.5`                |
//! | `(1, 2, 0)`        | `(1, 2, 0)`                |
//! | `[1, 'a']`         | `[1, 'a']`                 |
//! | entity reference   | `ObjectId(room-Room,12)`   |

use kassie_logic::EntityId;

use super::store::DocId;
use crate::record::Value;

const REF_PREFIX: &str = "ObjectId(";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeyError {
    #[error("a map cannot be used as a key")]
    MapKey,
    #[error("non-finite float key {0}")]
    NonFinite(f64),
    #[error("key references {0}, which has no document")]
    Unresolved(EntityId),
}

/// A decoded key. References are still store addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Literal>),
    List(Vec<Literal>),
    Ref { collection: String, id: DocId },
}

/// True when a plain string would be read back as something else.
fn is_ambiguous(s: &str) -> bool {
    matches!(s, "True" | "False" | "None")
        || s.starts_with(REF_PREFIX)
        || s.starts_with(|c: char| matches!(c, '(' | '[' | '\'' | '-' | '$') || c.is_ascii_digit())
}

fn quote(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
}

/// Encodes a map key. `locate` gives the collection and document of a
/// referenced entity.
pub fn encode_key(
    key: &Value,
    locate: &dyn Fn(EntityId) -> Option<(String, DocId)>,
) -> Result<String, KeyError> {
    match key {
        Value::Str(s) if !is_ambiguous(s) => Ok(s.clone()),
        other => {
            let mut out = String::new();
            write_literal(other, locate, &mut out)?;
            Ok(out)
        }
    }
}

fn write_literal(
    value: &Value,
    locate: &dyn Fn(EntityId) -> Option<(String, DocId)>,
    out: &mut String,
) -> Result<(), KeyError> {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) if !f.is_finite() => return Err(KeyError::NonFinite(*f)),
        Value::Float(f) => out.push_str(&format!("{f:?}")),
        Value::Str(s) => quote(s, out),
        Value::Tuple(items) => {
            out.push('(');
            write_items(items, locate, out)?;
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Value::List(items) => {
            out.push('[');
            write_items(items, locate, out)?;
            out.push(']');
        }
        Value::Ref(id) => {
            let (collection, doc) = locate(*id).ok_or(KeyError::Unresolved(*id))?;
            out.push_str(REF_PREFIX);
            out.push_str(&collection.replace('.', "-"));
            out.push(',');
            out.push_str(&doc.0.to_string());
            out.push(')');
        }
        Value::Map(_) => return Err(KeyError::MapKey),
    }
    Ok(())
}

fn write_items(
    items: &[Value],
    locate: &dyn Fn(EntityId) -> Option<(String, DocId)>,
    out: &mut String,
) -> Result<(), KeyError> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_literal(item, locate, out)?;
    }
    Ok(())
}

/// Decodes a key written by [`encode_key`]. Anything that does not parse
/// is a plain string.
pub fn decode_key(text: &str) -> Literal {
    if !is_ambiguous(text) {
        return Literal::Str(text.to_string());
    }
    let mut parser = Parser { text, pos: 0 };
    match parser.literal() {
        Some(literal) if parser.pos == text.len() => literal,
        _ => Literal::Str(text.to_string()),
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn literal(&mut self) -> Option<Literal> {
        if self.eat("None") {
            return Some(Literal::None);
        }
        if self.eat("True") {
            return Some(Literal::Bool(true));
        }
        if self.eat("False") {
            return Some(Literal::Bool(false));
        }
        if self.eat(REF_PREFIX) {
            return self.reference();
        }
        match self.peek()? {
            '\'' => self.string(),
            '(' => {
                self.pos += 1;
                let (items, trailing) = self.items(')')?;
                // `(x)` without a trailing comma is not a tuple.
                if items.len() == 1 && !trailing {
                    return None;
                }
                Some(Literal::Tuple(items))
            }
            '[' => {
                self.pos += 1;
                self.items(']').map(|(items, _)| Literal::List(items))
            }
            c if c == '-' || c.is_ascii_digit() => self.number(),
            _ => None,
        }
    }

    /// Comma separated literals up to `close`. Also reports whether the
    /// list ended with a trailing comma.
    fn items(&mut self, close: char) -> Option<(Vec<Literal>, bool)> {
        let mut items = Vec::new();
        let mut trailing = false;
        loop {
            self.skip_spaces();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Some((items, trailing));
            }
            items.push(self.literal()?);
            self.skip_spaces();
            match self.peek()? {
                ',' => {
                    self.pos += 1;
                    trailing = true;
                }
                c if c == close => {
                    self.pos += 1;
                    return Some((items, false));
                }
                _ => return None,
            }
        }
    }

    fn string(&mut self) -> Option<Literal> {
        self.pos += 1;
        let text: &str = self.text;
        let mut out = String::new();
        let mut chars = text[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    out.push(escaped);
                }
                '\'' => {
                    self.pos += i + 1;
                    return Some(Literal::Str(out));
                }
                c => out.push(c),
            }
        }
        None
    }

    fn number(&mut self) -> Option<Literal> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')))
            .unwrap_or(self.rest().len());
        let token = &self.rest()[..len];
        let literal = if let Ok(i) = token.parse::<i64>() {
            Literal::Int(i)
        } else {
            let f = token.parse::<f64>().ok().filter(|f| f.is_finite())?;
            Literal::Float(f)
        };
        self.pos += len;
        Some(literal)
    }

    fn reference(&mut self) -> Option<Literal> {
        let close = self.rest().find(')')?;
        let inner = &self.rest()[..close];
        let (collection, id) = inner.split_once(',')?;
        let id = id.trim().parse().ok()?;
        if collection.is_empty() {
            return None;
        }
        let literal = Literal::Ref {
            collection: collection.replace('-', "."),
            id: DocId(id),
        };
        self.pos += close + 1;
        Some(literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locate(id: EntityId) -> Option<(String, DocId)> {
        (id == EntityId(4)).then(|| ("character.Character".to_string(), DocId(12)))
    }

    fn encode(value: Value) -> String {
        encode_key(&value, &locate).unwrap()
    }

    #[test]
    fn test_plain_strings_stay_plain() {
        assert_eq!(encode(Value::Str("quay".into())), "quay");
        assert_eq!(decode_key("quay"), Literal::Str("quay".into()));
        assert_eq!(decode_key(""), Literal::Str(String::new()));
    }

    #[test]
    fn test_ambiguous_strings_are_quoted() {
        for text in ["(odd", "12", "True", "$ref", "it's", "ObjectId(x,1)", "-"] {
            let encoded = encode(Value::Str(text.into()));
            assert_eq!(decode_key(&encoded), Literal::Str(text.into()), "{encoded}");
        }
        assert_eq!(encode(Value::Str("12".into())), "'12'");
        assert_eq!(encode(Value::Str("(a'b".into())), r"'(a\'b'");
    }

    #[test]
    fn test_structured_keys() {
        let coords = Value::Tuple(vec![Value::Int(1), Value::Int(-2), Value::Int(0)]);
        assert_eq!(encode(coords), "(1, -2, 0)");
        assert_eq!(
            decode_key("(1, -2, 0)"),
            Literal::Tuple(vec![Literal::Int(1), Literal::Int(-2), Literal::Int(0)])
        );

        let single = Value::Tuple(vec![Value::Str("a".into())]);
        assert_eq!(encode(single), "('a',)");
        assert_eq!(
            decode_key("('a',)"),
            Literal::Tuple(vec![Literal::Str("a".into())])
        );

        let list = Value::List(vec![Value::Float(1.5), Value::Null, Value::Bool(true)]);
        assert_eq!(encode(list), "[1.5, None, True]");
        assert_eq!(
            decode_key("[1.5, None, True]"),
            Literal::List(vec![Literal::Float(1.5), Literal::None, Literal::Bool(true)])
        );
        assert_eq!(decode_key("7"), Literal::Int(7));
        assert_eq!(decode_key("()"), Literal::Tuple(Vec::new()));
    }

    #[test]
    fn test_reference_keys() {
        let encoded = encode(Value::Ref(EntityId(4)));
        assert_eq!(encoded, "ObjectId(character-Character,12)");
        assert_eq!(
            decode_key(&encoded),
            Literal::Ref {
                collection: "character.Character".into(),
                id: DocId(12)
            }
        );
        assert_eq!(
            encode_key(&Value::Ref(EntityId(5)), &locate),
            Err(KeyError::Unresolved(EntityId(5)))
        );
    }

    #[test]
    fn test_unparseable_falls_back_to_string() {
        assert_eq!(decode_key("(1, 2"), Literal::Str("(1, 2".into()));
        assert_eq!(decode_key("12abc"), Literal::Str("12abc".into()));
        assert_eq!(decode_key("(1)"), Literal::Str("(1)".into()));
    }

    #[test]
    fn test_map_keys_rejected() {
        assert_eq!(
            encode_key(&Value::Map(Vec::new()), &locate),
            Err(KeyError::MapKey)
        );
    }
}
