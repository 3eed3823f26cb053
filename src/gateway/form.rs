//! `application/x-www-form-urlencoded` parsing into nested values.
//!
//! Used for form bodies and query strings. Bracket notation builds nested
//! structures:
//!
//! ```text
//! a=1&a=2          -> {"a": ["1", "2"]}
//! tags[]=x         -> {"tags": ["x"]}
//! user[name]=ada   -> {"user": {"name": "ada"}}
//! ids[1]=b&ids[0]=a -> {"ids": ["a", "b"]}
//! ```
//!
//! Nesting stops after five bracket levels; the rest of the key is kept as a
//! literal segment. Numeric keys up to 20 turn an object into an array.

use serde_json::{Map, Value};

const MAX_DEPTH: usize = 5;
const ARRAY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Append,
}

/// Parse urlencoded bytes into an object of strings, arrays and objects.
pub fn parse_urlencoded(input: &[u8]) -> Value {
    let mut root = Value::Object(Map::new());
    for (key, value) in url::form_urlencoded::parse(input) {
        if key.is_empty() {
            continue;
        }
        let segments = split_key(&key);
        root = place(Some(root), &segments, value.into_owned());
    }

    match root {
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, compact(v))).collect()),
        other => other,
    }
}

fn split_key(key: &str) -> Vec<Segment> {
    let literal = || vec![Segment::Key(key.to_string())];
    let (head, mut rest) = match key.find('[') {
        Some(0) | None => return literal(),
        Some(open) => key.split_at(open),
    };

    let mut segments = vec![Segment::Key(head.to_string())];
    while segments.len() <= MAX_DEPTH {
        let Some(inner) = rest.strip_prefix('[') else {
            break;
        };
        let Some(close) = inner.find(']') else {
            break;
        };
        let name = &inner[..close];
        segments.push(if name.is_empty() {
            Segment::Append
        } else {
            Segment::Key(name.to_string())
        });
        rest = &inner[close + 1..];
    }

    if segments.len() == 1 {
        return literal();
    }
    if !rest.is_empty() {
        segments.push(Segment::Key(rest.to_string()));
    }
    segments
}

/// Merge `value` into `existing` at `segments`. On a shape conflict
/// (e.g. `a=1&a[b]=2`) the earlier value wins.
fn place(existing: Option<Value>, segments: &[Segment], value: String) -> Value {
    match segments.split_first() {
        None => match existing {
            None => Value::String(value),
            Some(Value::Array(mut items)) => {
                items.push(Value::String(value));
                Value::Array(items)
            }
            Some(Value::Object(map)) => Value::Object(map),
            Some(other) => Value::Array(vec![other, Value::String(value)]),
        },
        Some((Segment::Append, rest)) => {
            let mut items = match existing {
                None => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(Value::Object(map)) => return Value::Object(map),
                Some(other) => vec![other],
            };
            items.push(place(None, rest, value));
            Value::Array(items)
        }
        Some((Segment::Key(key), rest)) => {
            let mut map = match existing {
                None => Map::new(),
                Some(Value::Object(map)) => map,
                Some(other) => return other,
            };
            let child = map.remove(key);
            map.insert(key.clone(), place(child, rest, value));
            Value::Object(map)
        }
    }
}

fn array_index(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index <= ARRAY_LIMIT && index.to_string() == key).then_some(index)
}

fn compact(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(compact).collect()),
        Value::Object(map) => {
            let map: Map<String, Value> = map.into_iter().map(|(k, v)| (k, compact(v))).collect();
            if map.is_empty() || !map.keys().all(|k| array_index(k).is_some()) {
                return Value::Object(map);
            }
            let mut indexed: Vec<(usize, Value)> = map
                .into_iter()
                .filter_map(|(k, v)| array_index(&k).map(|i| (i, v)))
                .collect();
            indexed.sort_by_key(|(index, _)| *index);
            Value::Array(indexed.into_iter().map(|(_, v)| v).collect())
        }
        other => other,
    }
}
