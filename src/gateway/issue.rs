//! Validation issues and their wire codes.
//!
//! # Responsibilities
//! - Describe one schema violation with its location, code and message
//! - Derive the public [`IssueCode`] from the raw violation kind
//! - Render issue locations as `field.sub[2]` strings for API responses
//!
//! # Design Decisions
//! - Codes are a closed enum so consumers can match exhaustively
//! - Locations keep their segment structure; the dotted form is derived

use std::fmt::{self, Write};

use serde::{Serialize, Serializer};

use crate::gateway::schema::{StringCheck, StringFormat, ValueKind};

/// One step in the location of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Render a location as `a.b[0].c`.
pub fn join_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Index(index) => {
                let _ = write!(out, "[{index}]");
            }
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
        }
    }
    out
}

/// Machine-readable issue code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCode {
    Required,
    InvalidType,
    InvalidString,
    Format(StringFormat),
    TooSmall,
    TooBig,
    UnrecognizedKeys,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::Required => "required",
            IssueCode::InvalidType => "invalid_type",
            IssueCode::InvalidString => "invalid_string",
            IssueCode::Format(format) => format.as_str(),
            IssueCode::TooSmall => "too_small",
            IssueCode::TooBig => "too_big",
            IssueCode::UnrecognizedKeys => "unrecognized_keys",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IssueCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What a bound applies to, for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Measured {
    String,
    Number,
    Array,
}

/// Raw violation produced by the validator, before code mapping.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IssueKind {
    InvalidType { expected: ValueKind, received: ValueKind },
    InvalidString(StringCheck),
    TooSmall { measured: Measured, minimum: f64 },
    TooBig { measured: Measured, maximum: f64 },
    UnrecognizedKeys(Vec<String>),
}

impl IssueKind {
    /// Absent values become `required`, format checks report the format
    /// name, everything else keeps its general code.
    pub(crate) fn code(&self) -> IssueCode {
        match self {
            IssueKind::InvalidType { expected, received } => {
                if *received == ValueKind::Undefined && *expected != ValueKind::Undefined {
                    IssueCode::Required
                } else {
                    IssueCode::InvalidType
                }
            }
            IssueKind::InvalidString(StringCheck::Format(format)) => IssueCode::Format(*format),
            IssueKind::InvalidString(_) => IssueCode::InvalidString,
            IssueKind::TooSmall { .. } => IssueCode::TooSmall,
            IssueKind::TooBig { .. } => IssueCode::TooBig,
            IssueKind::UnrecognizedKeys(_) => IssueCode::UnrecognizedKeys,
        }
    }

    pub(crate) fn message(&self) -> String {
        match self {
            IssueKind::InvalidType { received: ValueKind::Undefined, .. } => "Required".to_string(),
            IssueKind::InvalidType { expected, received } => {
                format!("Expected {expected}, received {received}")
            }
            IssueKind::InvalidString(StringCheck::Format(format)) => format!("Invalid {format}"),
            IssueKind::InvalidString(StringCheck::StartsWith(prefix)) => {
                format!("Invalid input: must start with \"{prefix}\"")
            }
            IssueKind::InvalidString(StringCheck::EndsWith(suffix)) => {
                format!("Invalid input: must end with \"{suffix}\"")
            }
            IssueKind::InvalidString(StringCheck::Contains(needle)) => {
                format!("Invalid input: must include \"{needle}\"")
            }
            IssueKind::TooSmall { measured, minimum } => match measured {
                Measured::String => format!("String must contain at least {minimum} character(s)"),
                Measured::Number => format!("Number must be greater than or equal to {minimum}"),
                Measured::Array => format!("Array must contain at least {minimum} element(s)"),
            },
            IssueKind::TooBig { measured, maximum } => match measured {
                Measured::String => format!("String must contain at most {maximum} character(s)"),
                Measured::Number => format!("Number must be less than or equal to {maximum}"),
                Measured::Array => format!("Array must contain at most {maximum} element(s)"),
            },
            IssueKind::UnrecognizedKeys(keys) => {
                let quoted: Vec<String> = keys.iter().map(|k| format!("'{k}'")).collect();
                format!("Unrecognized key(s) in object: {}", quoted.join(", "))
            }
        }
    }
}

/// One field-level description of why validation failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: Vec<PathSegment>,
    pub code: IssueCode,
    pub message: String,
}

impl ValidationIssue {
    pub(crate) fn new(path: &[PathSegment], kind: IssueKind) -> Self {
        Self {
            path: path.to_vec(),
            code: kind.code(),
            message: kind.message(),
        }
    }

    /// Location rendered for API responses.
    pub fn field(&self) -> String {
        join_path(&self.path)
    }
}
