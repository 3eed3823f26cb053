//! Best-effort coercion of query string values.
//!
//! Query values arrive as strings. Before schema checking they are turned
//! into native values so schemas can declare `number` or `boolean` fields:
//!
//! - `""` stays `""`
//! - a string that is entirely a finite number becomes that number
//! - `"true"` / `"false"` become booleans
//! - anything else is left alone
//!
//! Arrays and objects are coerced element by element; `null` and values that
//! are already native pass through, so coercion is idempotent.

use serde_json::{Number, Value};

pub fn coerce(value: Value) -> Value {
    match value {
        Value::String(text) => coerce_str(text),
        Value::Array(items) => Value::Array(items.into_iter().map(coerce).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, coerce(v))).collect()),
        other => other,
    }
}

pub fn coerce_str(text: String) -> Value {
    match text.as_str() {
        "" => Value::String(text),
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match parse_number(&text) {
            Some(number) => Value::Number(number),
            None => Value::String(text),
        },
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(integer.into());
    }
    // f64 parsing also accepts "inf" and "NaN"; keep to plain decimal notation.
    let decimal = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
    if !decimal {
        return None;
    }
    let float = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        return Some((float as i64).into());
    }
    Number::from_f64(float)
}
