//! Content-type specific body decoders.
//!
//! # Responsibilities
//! - Turn raw body bytes into a JSON-like value for schema checking
//! - Declare which content type each decoder handles
//!
//! # Design Decisions
//! - A [`Decoders`] chain is an ordered list of {predicate, decode} pairs;
//!   the first decoder accepting the declared content type wins
//! - New decoders implement [`BodyDecoder`] and are appended with
//!   [`Decoders::with`]; selection logic never changes

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::gateway::form::parse_urlencoded;

/// Syntax error reported by a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError(err.to_string())
    }
}

/// A body decoder for one media type.
pub trait BodyDecoder: Send + Sync + fmt::Debug {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Media type prefix this decoder expects, lowercase.
    fn media_type(&self) -> &'static str;

    fn accepts(&self, content_type: &str) -> bool {
        content_type
            .trim_start()
            .to_ascii_lowercase()
            .starts_with(self.media_type())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;
}

/// `application/json`. Only objects and arrays are accepted at the top
/// level; an empty body decodes to `{}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl BodyDecoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn media_type(&self) -> &'static str {
        "application/json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }
        let value: Value = serde_json::from_slice(bytes)?;
        match value {
            Value::Object(_) | Value::Array(_) => Ok(value),
            other => Err(DecodeError(format!(
                "top-level JSON value must be an object or array, got {other}"
            ))),
        }
    }
}

/// `application/x-www-form-urlencoded` with bracket nesting.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormDecoder;

impl BodyDecoder for FormDecoder {
    fn name(&self) -> &'static str {
        "form"
    }

    fn media_type(&self) -> &'static str {
        "application/x-www-form-urlencoded"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        Ok(parse_urlencoded(bytes))
    }
}

/// `text/plain` as a single string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl BodyDecoder for TextDecoder {
    fn name(&self) -> &'static str {
        "text"
    }

    fn media_type(&self) -> &'static str {
        "text/plain"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        std::str::from_utf8(bytes)
            .map(|text| Value::String(text.to_string()))
            .map_err(|err| DecodeError(err.to_string()))
    }
}

/// `application/octet-stream` as an array of byte values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl BodyDecoder for RawDecoder {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn media_type(&self) -> &'static str {
        "application/octet-stream"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        Ok(Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()))
    }
}

/// Built-in decoders, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    Json,
    Form,
    Text,
    Raw,
}

impl DecoderKind {
    pub fn decoder(&self) -> Arc<dyn BodyDecoder> {
        match self {
            DecoderKind::Json => Arc::new(JsonDecoder),
            DecoderKind::Form => Arc::new(FormDecoder),
            DecoderKind::Text => Arc::new(TextDecoder),
            DecoderKind::Raw => Arc::new(RawDecoder),
        }
    }
}

/// Ordered decoder chain. Defaults to JSON only.
#[derive(Debug, Clone)]
pub struct Decoders {
    chain: Vec<Arc<dyn BodyDecoder>>,
}

impl Decoders {
    /// An empty chain; every body is rejected as unsupported.
    pub fn empty() -> Self {
        Self { chain: Vec::new() }
    }

    pub fn from_kinds(kinds: &[DecoderKind]) -> Self {
        Self {
            chain: kinds.iter().map(DecoderKind::decoder).collect(),
        }
    }

    /// Append a decoder to the end of the chain.
    pub fn with(mut self, decoder: impl BodyDecoder + 'static) -> Self {
        self.chain.push(Arc::new(decoder));
        self
    }

    /// First decoder accepting `content_type`. A missing content type
    /// matches nothing.
    pub fn select(&self, content_type: Option<&str>) -> Option<&dyn BodyDecoder> {
        let content_type = content_type?;
        self.chain
            .iter()
            .find(|decoder| decoder.accepts(content_type))
            .map(|decoder| decoder.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl Default for Decoders {
    fn default() -> Self {
        Self::from_kinds(&[DecoderKind::Json])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selects_by_content_type_prefix() {
        let decoders = Decoders::from_kinds(&[DecoderKind::Json, DecoderKind::Form]);
        assert_eq!(
            decoders.select(Some("application/json; charset=utf-8")).map(|d| d.name()),
            Some("json")
        );
        assert_eq!(
            decoders.select(Some("Application/X-WWW-Form-Urlencoded")).map(|d| d.name()),
            Some("form")
        );
        assert!(decoders.select(Some("text/plain")).is_none());
        assert!(decoders.select(None).is_none());
    }

    #[test]
    fn test_chain_order_wins() {
        #[derive(Debug)]
        struct AnyJson;
        impl BodyDecoder for AnyJson {
            fn name(&self) -> &'static str {
                "any-json"
            }
            fn media_type(&self) -> &'static str {
                "application/"
            }
            fn decode(&self, _bytes: &[u8]) -> Result<Value, DecodeError> {
                Ok(json!({}))
            }
        }

        let decoders = Decoders::empty().with(AnyJson).with(JsonDecoder);
        assert_eq!(decoders.select(Some("application/json")).unwrap().name(), "any-json");
        assert_eq!(decoders.names(), vec!["any-json", "json"]);
    }

    #[test]
    fn test_json_decoder() {
        assert_eq!(JsonDecoder.decode(br#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(JsonDecoder.decode(b"  ").unwrap(), json!({}));
        assert!(JsonDecoder.decode(b"{\"a\": ").is_err());
        assert!(JsonDecoder.decode(b"42").is_err());
    }

    #[test]
    fn test_text_and_raw_decoders() {
        assert_eq!(TextDecoder.decode(b"hello").unwrap(), json!("hello"));
        assert!(TextDecoder.decode(&[0xff, 0xfe]).is_err());
        assert_eq!(RawDecoder.decode(&[1, 2, 255]).unwrap(), json!([1, 2, 255]));
    }

    #[test]
    fn test_form_decoder() {
        assert_eq!(
            FormDecoder.decode(b"name=ada&tags[]=x").unwrap(),
            json!({"name": "ada", "tags": ["x"]})
        );
    }

    #[test]
    fn test_default_is_json_only() {
        assert_eq!(Decoders::default().names(), vec!["json"]);
    }
}
