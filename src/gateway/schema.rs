//! Declarative schemas for wire data.
//!
//! A [`Schema`] maps field names to [`Field`] descriptions. Schemas are built
//! once when the router is assembled and shared read-only across requests.
//!
//! ```
//! use request_gate::gateway::{Field, Schema};
//!
//! let schema = Schema::new()
//!     .field("name", Field::string().min(1.0))
//!     .field("email", Field::string().email().optional())
//!     .field("tags", Field::array(Field::string()).optional());
//! assert_eq!(schema.len(), 3);
//! ```
//!
//! Bodies that are not objects, such as `text/plain` or raw bytes, use a
//! root field instead:
//!
//! ```
//! use request_gate::gateway::{Field, Schema};
//!
//! let schema = Schema::root(Field::string().max(280));
//! assert!(schema.validate(&"hello".into()).is_ok());
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::gateway::validate::{validate, ValidateError};

/// JSON value kinds as they appear in issue messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Undefined,
    Null,
    String,
    Number,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
}

impl ValueKind {
    /// Kind of an optional value; `None` is `undefined`.
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None => ValueKind::Undefined,
            Some(Value::Null) => ValueKind::Null,
            Some(Value::Bool(_)) => ValueKind::Boolean,
            Some(Value::Number(_)) => ValueKind::Number,
            Some(Value::String(_)) => ValueKind::String,
            Some(Value::Array(_)) => ValueKind::Array,
            Some(Value::Object(_)) => ValueKind::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Object => "object",
            ValueKind::Array => "array",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named string formats. A failed format check reports the format name as
/// its issue code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    Email,
    Url,
    Uuid,
}

impl StringFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::Email => "email",
            StringFormat::Url => "url",
            StringFormat::Uuid => "uuid",
        }
    }

    pub fn matches(&self, input: &str) -> bool {
        match self {
            StringFormat::Email => is_email(input),
            StringFormat::Url => url::Url::parse(input).is_ok(),
            StringFormat::Uuid => uuid::Uuid::parse_str(input).is_ok(),
        }
    }
}

impl fmt::Display for StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_email(input: &str) -> bool {
    let Some((local, domain)) = input.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.len() > 255 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c));

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld_ok = labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    local_ok && labels_ok && tld_ok
}

/// A content check on a string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringCheck {
    Format(StringFormat),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
}

impl StringCheck {
    pub fn passes(&self, input: &str) -> bool {
        match self {
            StringCheck::Format(format) => format.matches(input),
            StringCheck::StartsWith(prefix) => input.starts_with(prefix.as_str()),
            StringCheck::EndsWith(suffix) => input.ends_with(suffix.as_str()),
            StringCheck::Contains(needle) => input.contains(needle.as_str()),
        }
    }
}

/// Type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    String { checks: Vec<StringCheck> },
    Number { integer: bool },
    Boolean,
    Object(Schema),
    Array(Box<Field>),
}

/// One entry of a [`Schema`]. Fields are required unless marked
/// [`optional`](Field::optional).
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) kind: Kind,
    pub(crate) required: bool,
    pub(crate) nullable: bool,
    pub(crate) default: Option<Value>,
    pub(crate) min: Option<f64>,
    pub(crate) max: Option<f64>,
}

impl Field {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            required: true,
            nullable: false,
            default: None,
            min: None,
            max: None,
        }
    }

    pub fn string() -> Self {
        Self::of(Kind::String { checks: Vec::new() })
    }

    pub fn number() -> Self {
        Self::of(Kind::Number { integer: false })
    }

    pub fn integer() -> Self {
        Self::of(Kind::Number { integer: true })
    }

    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    pub fn object(schema: Schema) -> Self {
        Self::of(Kind::Object(schema))
    }

    pub fn array(items: Field) -> Self {
        Self::of(Kind::Array(Box::new(items)))
    }

    /// Allow the field to be absent.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set presence explicitly.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Accept `null` as a value.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Value substituted when the field is absent. Implies optional.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Lower bound: string length, number value or array length.
    pub fn min(mut self, min: impl Into<f64>) -> Self {
        self.min = Some(min.into());
        self
    }

    /// Upper bound: string length, number value or array length.
    pub fn max(mut self, max: impl Into<f64>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn email(self) -> Self {
        self.check(StringCheck::Format(StringFormat::Email))
    }

    pub fn url(self) -> Self {
        self.check(StringCheck::Format(StringFormat::Url))
    }

    pub fn uuid(self) -> Self {
        self.check(StringCheck::Format(StringFormat::Uuid))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Self {
        self.check(StringCheck::StartsWith(prefix.into()))
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Self {
        self.check(StringCheck::EndsWith(suffix.into()))
    }

    pub fn contains(self, needle: impl Into<String>) -> Self {
        self.check(StringCheck::Contains(needle.into()))
    }

    /// Add a string check. Ignored for non-string fields.
    pub fn check(mut self, check: StringCheck) -> Self {
        if let Kind::String { checks } = &mut self.kind {
            checks.push(check);
        }
        self
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required && self.default.is_none()
    }

    /// The kind reported as `expected` in type mismatch issues.
    pub fn expected(&self) -> ValueKind {
        match &self.kind {
            Kind::String { .. } => ValueKind::String,
            Kind::Number { integer: true } => ValueKind::Integer,
            Kind::Number { integer: false } => ValueKind::Number,
            Kind::Boolean => ValueKind::Boolean,
            Kind::Object(_) => ValueKind::Object,
            Kind::Array(_) => ValueKind::Array,
        }
    }

    fn depth(&self) -> usize {
        match &self.kind {
            Kind::Object(schema) => schema.depth(),
            Kind::Array(items) => 1 + items.depth(),
            _ => 0,
        }
    }
}

/// How keys absent from the schema are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Drop them from the output.
    #[default]
    Strip,
    /// Copy them to the output unchecked.
    Passthrough,
    /// Report them as `unrecognized_keys`.
    Strict,
}

/// Expected shape of a request part: an object described field by field,
/// or any single value described by a root [`Field`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub(crate) fields: Vec<(String, Field)>,
    pub(crate) unknown_keys: UnknownKeys,
    pub(crate) root: Option<Box<Field>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe the whole value with one field, e.g. a string body or a
    /// top-level array. Named fields are ignored once a root is set.
    pub fn root(field: Field) -> Self {
        Self {
            root: Some(Box::new(field)),
            ..Self::default()
        }
    }

    pub fn root_field(&self) -> Option<&Field> {
        self.root.as_deref()
    }

    /// Add a field, replacing any previous field with the same name.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
        self
    }

    pub fn strict(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Strict;
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Passthrough;
        self
    }

    pub fn unknown_keys(&self) -> UnknownKeys {
        self.unknown_keys
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, field)| field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Nesting depth; a flat object is depth 1.
    pub fn depth(&self) -> usize {
        match &self.root {
            Some(root) => root.depth().max(1),
            None => 1 + self.fields.iter().map(|(_, f)| f.depth()).max().unwrap_or(0),
        }
    }

    /// Check `value` against this schema and return the conforming output.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        validate(self, value)
    }
}
