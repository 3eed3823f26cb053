//! Schema validation gateway.
//!
//! # Data Flow
//! ```text
//! Content-Type
//!     → decoders.rs (first decoder whose media type matches)
//! body bytes (read only once a decoder is chosen)
//!     → decoder
//!     → validate.rs (walk value against Schema, collect issues)
//!     → request extensions (Validated<BodyTarget>)
//!
//! query string
//!     → form.rs (bracket-aware urlencoded parsing)
//!     → coerce.rs (numeric / boolean strings become native values)
//!     → validate.rs
//!
//! path parameters
//!     → validate.rs (no coercion)
//! ```
//!
//! # Design Decisions
//! - Decoding and validation are pure functions; [`ValidateLayer`] is the only
//!   piece that touches a request
//! - Every failure is a [`GatewayError`] so all stages render problems the
//!   same way
//! - Handlers read results through typed extractors, never raw extensions

pub mod coerce;
pub mod decoders;
pub mod extract;
pub mod form;
pub mod issue;
pub mod layer;
pub mod schema;
pub mod validate;

use std::fmt;

use serde_json::Value;

use crate::error::GatewayError;

pub use coerce::coerce;
pub use decoders::{BodyDecoder, DecodeError, DecoderKind, Decoders};
pub use extract::{ValidatedBody, ValidatedParams, ValidatedQuery};
pub use form::parse_urlencoded;
pub use issue::{join_path, IssueCode, PathSegment, ValidationIssue};
pub use layer::ValidateLayer;
pub use schema::{Field, Kind, Schema, StringCheck, StringFormat, UnknownKeys, ValueKind};
pub use validate::{ValidateError, MAX_DEPTH};

/// The part of a request a schema applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Body,
    Query,
    Params,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Body => "body",
            Target::Query => "query",
            Target::Params => "params",
        }
    }

    pub(crate) fn title(&self) -> &'static str {
        match self {
            Target::Body => "Provided request body contains schema violations",
            Target::Query => "Provided request query parameters contain schema violations",
            Target::Params => "Provided request path parameters contain schema violations",
        }
    }

    /// Key naming the issue location in problem bodies.
    pub(crate) fn issue_key(&self) -> &'static str {
        match self {
            Target::Body => "field",
            Target::Query => "queryParam",
            Target::Params => "param",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a body with the first matching decoder and validate it.
pub fn parse_body(
    raw: &[u8],
    content_type: Option<&str>,
    schema: &Schema,
    decoders: &Decoders,
) -> Result<Value, GatewayError> {
    let decoder = select_decoder(content_type, decoders)?;
    decode_body(raw, decoder, schema)
}

/// The decoder for `content_type`, or `UnsupportedMediaType` when none
/// matches.
pub fn select_decoder<'a>(
    content_type: Option<&str>,
    decoders: &'a Decoders,
) -> Result<&'a dyn BodyDecoder, GatewayError> {
    decoders
        .select(content_type)
        .ok_or_else(|| GatewayError::UnsupportedMediaType {
            content_type: content_type.map(str::to_string),
        })
}

/// Decode `raw` with an already selected decoder and validate the result.
pub fn decode_body(
    raw: &[u8],
    decoder: &dyn BodyDecoder,
    schema: &Schema,
) -> Result<Value, GatewayError> {
    let decoded = decoder
        .decode(raw)
        .map_err(|err| GatewayError::MalformedRequestBody {
            decoder: decoder.name(),
            diagnostic: err.0,
        })?;

    check(Target::Body, schema, &decoded)
}

/// Coerce string values to native ones, then validate.
pub fn parse_query(raw: Value, schema: &Schema) -> Result<Value, GatewayError> {
    check(Target::Query, schema, &coerce(raw))
}

/// [`parse_query`] over an undecoded query string such as `a=1&b[]=x`.
pub fn parse_query_str(query: &str, schema: &Schema) -> Result<Value, GatewayError> {
    parse_query(parse_urlencoded(query.as_bytes()), schema)
}

/// Validate path parameters as they are.
pub fn parse_params(raw: Value, schema: &Schema) -> Result<Value, GatewayError> {
    check(Target::Params, schema, &raw)
}

fn check(target: Target, schema: &Schema, value: &Value) -> Result<Value, GatewayError> {
    schema.validate(value).map_err(|err| match err {
        ValidateError::Issues(issues) => GatewayError::Validation { target, issues },
        ValidateError::DepthExceeded(_) => GatewayError::internal(err.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::new()
            .field("name", Field::string())
            .field("email", Field::string().email().optional())
    }

    #[test]
    fn test_parse_body_valid() {
        let value = parse_body(
            br#"{"name": "ada"}"#,
            Some("application/json"),
            &user_schema(),
            &Decoders::default(),
        )
        .unwrap();
        assert_eq!(value, json!({"name": "ada"}));
    }

    #[test]
    fn test_parse_body_invalid_type() {
        let err = parse_body(
            br#"{"name": 123}"#,
            Some("application/json"),
            &user_schema(),
            &Decoders::default(),
        )
        .unwrap_err();
        match err {
            GatewayError::Validation { target, issues } => {
                assert_eq!(target, Target::Body);
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].field(), "name");
                assert_eq!(issues[0].code, IssueCode::InvalidType);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_body_unsupported_media_type_skips_decoding() {
        let err = parse_body(b"not json", Some("text/plain"), &user_schema(), &Decoders::default())
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::UnsupportedMediaType {
                content_type: Some("text/plain".to_string())
            }
        );

        let err = parse_body(b"{}", None, &user_schema(), &Decoders::default()).unwrap_err();
        assert_eq!(err, GatewayError::UnsupportedMediaType { content_type: None });
    }

    #[test]
    fn test_text_and_raw_bodies_with_root_schema() {
        let decoders = Decoders::from_kinds(&[DecoderKind::Text, DecoderKind::Raw]);

        let value = parse_body(
            b"hello",
            Some("text/plain; charset=utf-8"),
            &Schema::root(Field::string().min(1)),
            &decoders,
        )
        .unwrap();
        assert_eq!(value, json!("hello"));

        let value = parse_body(
            &[1, 2, 255],
            Some("application/octet-stream"),
            &Schema::root(Field::array(Field::integer().min(0).max(255))),
            &decoders,
        )
        .unwrap();
        assert_eq!(value, json!([1, 2, 255]));

        let err = parse_body(b"", Some("text/plain"), &Schema::root(Field::string().min(1)), &decoders)
            .unwrap_err();
        let GatewayError::Validation { issues, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(issues[0].code, IssueCode::TooSmall);
    }

    #[test]
    fn test_json_array_body() {
        let schema = Schema::root(Field::array(Field::string()).max(2));
        let value = parse_body(br#"["a", "b"]"#, Some("application/json"), &schema, &Decoders::default())
            .unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[test]
    fn test_select_decoder() {
        let decoders = Decoders::default();
        assert_eq!(
            select_decoder(Some("application/json"), &decoders).unwrap().name(),
            "json"
        );
        assert_eq!(
            select_decoder(Some("text/plain"), &decoders).unwrap_err(),
            GatewayError::UnsupportedMediaType {
                content_type: Some("text/plain".to_string())
            }
        );
    }

    #[test]
    fn test_parse_body_malformed() {
        let err = parse_body(
            br#"{"name": "#,
            Some("application/json"),
            &user_schema(),
            &Decoders::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::MalformedRequestBody { decoder: "json", .. }
        ));
    }

    #[test]
    fn test_parse_body_format_code() {
        let err = parse_body(
            br#"{"name": "ada", "email": "nope"}"#,
            Some("application/json"),
            &user_schema(),
            &Decoders::default(),
        )
        .unwrap_err();
        let GatewayError::Validation { issues, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(issues[0].code.as_str(), "email");
    }

    #[test]
    fn test_parse_body_one_required_issue_per_missing_field() {
        let schema = Schema::new()
            .field("a", Field::string())
            .field("b", Field::number())
            .field("c", Field::boolean().optional());
        let err = parse_body(b"{}", Some("application/json"), &schema, &Decoders::default())
            .unwrap_err();
        let GatewayError::Validation { issues, .. } = err else {
            panic!("expected validation error");
        };
        let codes: Vec<(String, IssueCode)> =
            issues.iter().map(|i| (i.field(), i.code)).collect();
        assert_eq!(
            codes,
            vec![
                ("a".to_string(), IssueCode::Required),
                ("b".to_string(), IssueCode::Required),
            ]
        );
    }

    #[test]
    fn test_parse_query_coerces_before_validation() {
        let schema = Schema::new()
            .field("count", Field::number())
            .field("active", Field::boolean());
        let value = parse_query(json!({"count": "5", "active": "true"}), &schema).unwrap();
        assert_eq!(value, json!({"count": 5, "active": true}));

        let value = parse_query_str("count=5&active=true", &schema).unwrap();
        assert_eq!(value, json!({"count": 5, "active": true}));
    }

    #[test]
    fn test_parse_params_does_not_coerce() {
        let schema = Schema::new().field("id", Field::number());
        let err = parse_params(json!({"id": "42"}), &schema).unwrap_err();
        let GatewayError::Validation { target, issues } = err else {
            panic!("expected validation error");
        };
        assert_eq!(target, Target::Params);
        assert_eq!(issues[0].code, IssueCode::InvalidType);

        let schema = Schema::new().field("id", Field::string());
        assert_eq!(
            parse_params(json!({"id": "42"}), &schema).unwrap(),
            json!({"id": "42"})
        );
    }

    #[test]
    fn test_valid_input_is_returned_unchanged() {
        let schema = Schema::new()
            .field("name", Field::string())
            .field("tags", Field::array(Field::string()))
            .field("meta", Field::object(Schema::new().field("n", Field::integer())));
        let input = json!({"name": "x", "tags": ["a", "b"], "meta": {"n": 3}});
        assert_eq!(parse_params(input.clone(), &schema).unwrap(), input);
        assert_eq!(parse_query(input.clone(), &schema).unwrap(), input);
    }

    #[test]
    fn test_depth_guard_is_internal() {
        let mut schema = Schema::new().field("leaf", Field::string());
        for _ in 0..MAX_DEPTH {
            schema = Schema::new().field("next", Field::object(schema));
        }
        let mut value = json!({"leaf": "x"});
        for _ in 0..MAX_DEPTH {
            value = json!({ "next": value });
        }
        let err = parse_params(value, &schema).unwrap_err();
        assert!(matches!(err, GatewayError::Internal { .. }));
    }
}
