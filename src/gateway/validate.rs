//! Schema checking.
//!
//! Walks a decoded value alongside its [`Schema`], collecting every
//! violation instead of stopping at the first one. The output is rebuilt
//! from the schema: unknown keys are handled per [`UnknownKeys`], defaults
//! fill absent fields, and absent optional fields stay absent.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::gateway::issue::{IssueKind, Measured, PathSegment, ValidationIssue};
use crate::gateway::schema::{Field, Kind, Schema, StringCheck, UnknownKeys, ValueKind};

/// Deepest schema nesting walked before giving up.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidateError {
    #[error("{} schema violation(s)", .0.len())]
    Issues(Vec<ValidationIssue>),

    #[error("schema nesting exceeds {0} levels")]
    DepthExceeded(usize),
}

/// Check `value` against `schema`.
pub fn validate(schema: &Schema, value: &Value) -> Result<Value, ValidateError> {
    let mut walker = Walker::default();
    let output = match schema.root_field() {
        Some(root) => match walker.field(root, Some(value), 0)? {
            Checked::Value(output) => Some(output),
            Checked::Absent | Checked::Rejected => None,
        },
        None => walker.object(schema, value, 1)?,
    };
    match output {
        Some(output) if walker.issues.is_empty() => Ok(output),
        _ => Err(ValidateError::Issues(walker.issues)),
    }
}

enum Checked {
    Value(Value),
    Absent,
    Rejected,
}

#[derive(Default)]
struct Walker {
    path: Vec<PathSegment>,
    issues: Vec<ValidationIssue>,
}

impl Walker {
    fn report(&mut self, kind: IssueKind) {
        self.issues.push(ValidationIssue::new(&self.path, kind));
    }

    fn mismatch(&mut self, expected: ValueKind, value: &Value) {
        self.report(IssueKind::InvalidType {
            expected,
            received: ValueKind::of(Some(value)),
        });
    }

    /// `None` means the value was rejected and issues were recorded.
    fn object(
        &mut self,
        schema: &Schema,
        value: &Value,
        depth: usize,
    ) -> Result<Option<Value>, ValidateError> {
        if depth > MAX_DEPTH {
            return Err(ValidateError::DepthExceeded(MAX_DEPTH));
        }
        let Value::Object(input) = value else {
            self.mismatch(ValueKind::Object, value);
            return Ok(None);
        };

        let mut output = Map::new();
        let mut accepted = true;
        for (name, field) in schema.fields() {
            self.path.push(PathSegment::Key(name.to_string()));
            let checked = self.field(field, input.get(name), depth);
            self.path.pop();
            match checked? {
                Checked::Value(value) => {
                    output.insert(name.to_string(), value);
                }
                Checked::Absent => {}
                Checked::Rejected => accepted = false,
            }
        }

        let unknown: Vec<&String> = input.keys().filter(|k| schema.get(k).is_none()).collect();
        match schema.unknown_keys() {
            UnknownKeys::Strip => {}
            UnknownKeys::Passthrough => {
                for key in unknown {
                    output.insert(key.clone(), input[key].clone());
                }
            }
            UnknownKeys::Strict => {
                if !unknown.is_empty() {
                    self.report(IssueKind::UnrecognizedKeys(
                        unknown.into_iter().cloned().collect(),
                    ));
                    accepted = false;
                }
            }
        }

        Ok(accepted.then_some(Value::Object(output)))
    }

    fn field(
        &mut self,
        field: &Field,
        value: Option<&Value>,
        depth: usize,
    ) -> Result<Checked, ValidateError> {
        let value = match (value, &field.default) {
            (Some(value), _) => value,
            (None, Some(default)) => return Ok(Checked::Value(default.clone())),
            (None, None) if field.is_required() => {
                self.report(IssueKind::InvalidType {
                    expected: field.expected(),
                    received: ValueKind::Undefined,
                });
                return Ok(Checked::Rejected);
            }
            (None, None) => return Ok(Checked::Absent),
        };

        if value.is_null() && field.nullable {
            return Ok(Checked::Value(Value::Null));
        }

        let accepted = match &field.kind {
            Kind::String { checks } => self.string(field, checks, value),
            Kind::Number { integer } => self.number(field, *integer, value),
            Kind::Boolean => {
                if value.is_boolean() {
                    Some(value.clone())
                } else {
                    self.mismatch(ValueKind::Boolean, value);
                    None
                }
            }
            Kind::Object(schema) => self.object(schema, value, depth + 1)?,
            Kind::Array(items) => self.array(field, items, value, depth + 1)?,
        };

        Ok(match accepted {
            Some(value) => Checked::Value(value),
            None => Checked::Rejected,
        })
    }

    fn string(&mut self, field: &Field, checks: &[StringCheck], value: &Value) -> Option<Value> {
        let Some(text) = value.as_str() else {
            self.mismatch(ValueKind::String, value);
            return None;
        };

        let before = self.issues.len();
        let length = text.chars().count() as f64;
        self.bounds(field, Measured::String, length);
        for check in checks {
            if !check.passes(text) {
                self.report(IssueKind::InvalidString(check.clone()));
            }
        }
        (self.issues.len() == before).then(|| value.clone())
    }

    fn number(&mut self, field: &Field, integer: bool, value: &Value) -> Option<Value> {
        let Some(number) = value.as_f64() else {
            let expected = if integer { ValueKind::Integer } else { ValueKind::Number };
            self.mismatch(expected, value);
            return None;
        };
        if integer && !(value.is_i64() || value.is_u64() || number.fract() == 0.0) {
            self.report(IssueKind::InvalidType {
                expected: ValueKind::Integer,
                received: ValueKind::Float,
            });
            return None;
        }

        let before = self.issues.len();
        self.bounds(field, Measured::Number, number);
        (self.issues.len() == before).then(|| value.clone())
    }

    fn array(
        &mut self,
        field: &Field,
        items: &Field,
        value: &Value,
        depth: usize,
    ) -> Result<Option<Value>, ValidateError> {
        if depth > MAX_DEPTH {
            return Err(ValidateError::DepthExceeded(MAX_DEPTH));
        }
        let Some(elements) = value.as_array() else {
            self.mismatch(ValueKind::Array, value);
            return Ok(None);
        };

        let before = self.issues.len();
        self.bounds(field, Measured::Array, elements.len() as f64);

        let mut output = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            self.path.push(PathSegment::Index(index));
            let checked = self.field(items, Some(element), depth);
            self.path.pop();
            if let Checked::Value(value) = checked? {
                output.push(value);
            }
        }

        Ok((self.issues.len() == before).then_some(Value::Array(output)))
    }

    fn bounds(&mut self, field: &Field, measured: Measured, actual: f64) {
        if let Some(minimum) = field.min {
            if actual < minimum {
                self.report(IssueKind::TooSmall { measured, minimum });
            }
        }
        if let Some(maximum) = field.max {
            if actual > maximum {
                self.report(IssueKind::TooBig { measured, maximum });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::issue::IssueCode;
    use crate::gateway::schema::StringFormat;
    use serde_json::json;

    fn issues(schema: &Schema, value: Value) -> Vec<ValidationIssue> {
        match validate(schema, &value) {
            Err(ValidateError::Issues(issues)) => issues,
            other => panic!("expected issues, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_input_is_returned_unchanged() {
        let schema = Schema::new()
            .field("name", Field::string())
            .field("age", Field::integer())
            .field("admin", Field::boolean())
            .field("tags", Field::array(Field::string()))
            .field("address", Field::object(Schema::new().field("city", Field::string())));
        let input = json!({
            "name": "Ada",
            "age": 36,
            "admin": false,
            "tags": ["math", "engines"],
            "address": {"city": "London"}
        });
        assert_eq!(validate(&schema, &input).unwrap(), input);
    }

    #[test]
    fn test_one_required_issue_per_missing_field() {
        let schema = Schema::new()
            .field("a", Field::string())
            .field("b", Field::number())
            .field("c", Field::boolean().optional());
        let found = issues(&schema, json!({}));
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|i| i.code == IssueCode::Required));
        assert_eq!(found[0].field(), "a");
        assert_eq!(found[1].field(), "b");
    }

    #[test]
    fn test_wrong_type_reports_invalid_type() {
        let schema = Schema::new().field("name", Field::string());
        let found = issues(&schema, json!({"name": 123}));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field(), "name");
        assert_eq!(found[0].code, IssueCode::InvalidType);
        assert_eq!(found[0].message, "Expected string, received number");
    }

    #[test]
    fn test_nested_locations() {
        let schema = Schema::new().field(
            "items",
            Field::array(Field::object(Schema::new().field("id", Field::integer()))),
        );
        let found = issues(&schema, json!({"items": [{"id": 1}, {"id": "x"}, {}]}));
        let fields: Vec<String> = found.iter().map(|i| i.field()).collect();
        assert_eq!(fields, vec!["items[1].id", "items[2].id"]);
        assert_eq!(found[0].code, IssueCode::InvalidType);
        assert_eq!(found[1].code, IssueCode::Required);
        assert_eq!(
            found[0].path,
            vec![
                PathSegment::Key("items".into()),
                PathSegment::Index(1),
                PathSegment::Key("id".into())
            ]
        );
    }

    #[test]
    fn test_format_issue_uses_format_name() {
        let schema = Schema::new().field("email", Field::string().email());
        let found = issues(&schema, json!({"email": "nope"}));
        assert_eq!(found[0].code, IssueCode::Format(StringFormat::Email));
        assert_eq!(found[0].code.as_str(), "email");
    }

    #[test]
    fn test_string_checks_all_reported() {
        let schema = Schema::new().field("sku", Field::string().min(5.0).starts_with("SKU-"));
        let found = issues(&schema, json!({"sku": "AB"}));
        let codes: Vec<&str> = found.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["too_small", "invalid_string"]);
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let schema = Schema::new().field("n", Field::integer());
        let found = issues(&schema, json!({"n": 1.5}));
        assert_eq!(found[0].message, "Expected integer, received float");
        assert!(validate(&schema, &json!({"n": 2.0})).is_ok());
    }

    #[test]
    fn test_number_bounds() {
        let schema = Schema::new().field("n", Field::number().min(1.0).max(10.0));
        assert_eq!(issues(&schema, json!({"n": 0}))[0].code, IssueCode::TooSmall);
        assert_eq!(issues(&schema, json!({"n": 11}))[0].code, IssueCode::TooBig);
        assert!(validate(&schema, &json!({"n": 10})).is_ok());
    }

    #[test]
    fn test_unknown_keys_policies() {
        let base = Schema::new().field("a", Field::string());
        let input = json!({"a": "x", "b": 1});

        assert_eq!(validate(&base, &input).unwrap(), json!({"a": "x"}));
        assert_eq!(validate(&base.clone().passthrough(), &input).unwrap(), input);

        let found = issues(&base.strict(), input);
        assert_eq!(found[0].code, IssueCode::UnrecognizedKeys);
        assert_eq!(found[0].message, "Unrecognized key(s) in object: 'b'");
    }

    #[test]
    fn test_defaults_and_nullable() {
        let schema = Schema::new()
            .field("page", Field::integer().with_default(1))
            .field("note", Field::string().nullable())
            .field("extra", Field::string().optional());
        let output = validate(&schema, &json!({"note": null})).unwrap();
        assert_eq!(output, json!({"page": 1, "note": null}));

        let found = issues(&schema, json!({"note": null, "extra": null}));
        assert_eq!(found[0].field(), "extra");
        assert_eq!(found[0].message, "Expected string, received null");
    }

    #[test]
    fn test_root_must_be_object() {
        let schema = Schema::new().field("a", Field::string());
        let found = issues(&schema, json!([1, 2]));
        assert_eq!(found[0].field(), "");
        assert_eq!(found[0].message, "Expected object, received array");
    }

    #[test]
    fn test_root_field() {
        let text = Schema::root(Field::string().min(1));
        assert_eq!(validate(&text, &json!("hello")).unwrap(), json!("hello"));
        let found = issues(&text, json!({"a": 1}));
        assert_eq!(found[0].field(), "");
        assert_eq!(found[0].message, "Expected string, received object");

        let list = Schema::root(Field::array(Field::object(
            Schema::new().field("id", Field::integer()),
        )));
        assert_eq!(
            validate(&list, &json!([{"id": 1, "x": 0}])).unwrap(),
            json!([{"id": 1}])
        );
        let found = issues(&list, json!([{"id": 1}, {"id": "two"}]));
        assert_eq!(found[0].field(), "[1].id");
    }

    #[test]
    fn test_depth_guard() {
        let mut schema = Schema::new().field("leaf", Field::string());
        for _ in 0..MAX_DEPTH {
            schema = Schema::new().field("next", Field::object(schema));
        }
        let mut value = json!({"leaf": "x"});
        for _ in 0..MAX_DEPTH {
            value = json!({ "next": value });
        }
        assert_eq!(
            validate(&schema, &value),
            Err(ValidateError::DepthExceeded(MAX_DEPTH))
        );
    }
}
