//! Problem responses.
//!
//! Every rejection the gateway produces is a [`GatewayError`], rendered as a
//! JSON body of the form `{ "title", "type", "cause"? }`. Diagnostic causes
//! for malformed bodies and internal errors are only exposed in development.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Mode;
use crate::gateway::{Target, ValidationIssue};

/// Machine-readable problem type, sent as the `type` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnsupportedMediaType,
    PayloadTooLarge,
    MalformedRequestBody,
    ValidationError,
    Throttled,
    MissingAuthorization,
    AccessDenied,
    NotFound,
    InternalServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedMediaType => "UnsupportedMediaType",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::MalformedRequestBody => "MalformedRequestBody",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::Throttled => "Throttled",
            ErrorKind::MissingAuthorization => "MissingAuthorization",
            ErrorKind::AccessDenied => "AccessDenied",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InternalServerError => "InternalServerError",
        }
    }
}

/// JSON problem body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("unsupported media type {content_type:?}")]
    UnsupportedMediaType { content_type: Option<String> },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{decoder} body cannot be parsed: {diagnostic}")]
    MalformedRequestBody {
        decoder: &'static str,
        diagnostic: String,
    },

    #[error("{target} failed validation with {} issue(s)", issues.len())]
    Validation {
        target: Target,
        issues: Vec<ValidationIssue>,
    },

    #[error("request throttled")]
    Throttled { retry_after: Option<Duration> },

    #[error("missing authorization")]
    MissingAuthorization,

    #[error("access denied")]
    AccessDenied,

    #[error("not found")]
    NotFound,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::MalformedRequestBody { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::MissingAuthorization => StatusCode::UNAUTHORIZED,
            GatewayError::AccessDenied => StatusCode::FORBIDDEN,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::UnsupportedMediaType { .. } => ErrorKind::UnsupportedMediaType,
            GatewayError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            GatewayError::MalformedRequestBody { .. } => ErrorKind::MalformedRequestBody,
            GatewayError::Validation { .. } => ErrorKind::ValidationError,
            GatewayError::Throttled { .. } => ErrorKind::Throttled,
            GatewayError::MissingAuthorization => ErrorKind::MissingAuthorization,
            GatewayError::AccessDenied => ErrorKind::AccessDenied,
            GatewayError::NotFound => ErrorKind::NotFound,
            GatewayError::Internal { .. } => ErrorKind::InternalServerError,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            GatewayError::UnsupportedMediaType { .. } => {
                "Provided request body has unsupported media type"
            }
            GatewayError::PayloadTooLarge { .. } => "Provided request body is too large",
            GatewayError::MalformedRequestBody { .. } => "Provided request body cannot be parsed",
            GatewayError::Validation { target, .. } => target.title(),
            GatewayError::Throttled { .. } => "Request has been throttled",
            GatewayError::MissingAuthorization => "Resource requires providing authorization data",
            GatewayError::AccessDenied => "Provided authorization data is invalid",
            GatewayError::NotFound => "The requested resource was not found",
            GatewayError::Internal { .. } => {
                "Server has encountered an error when processing the request"
            }
        }
    }

    /// Problem body for this error in the given mode.
    pub fn problem(&self, mode: Mode) -> Problem {
        let cause = match self {
            GatewayError::Validation { target, issues } => Some(Value::Array(
                issues
                    .iter()
                    .map(|issue| {
                        json!({
                            target.issue_key(): issue.field(),
                            "code": issue.code,
                            "message": issue.message,
                        })
                    })
                    .collect(),
            )),
            GatewayError::MalformedRequestBody { diagnostic, .. } if !mode.is_production() => {
                Some(Value::String(diagnostic.clone()))
            }
            GatewayError::Internal { message } if !mode.is_production() => {
                Some(Value::String(message.clone()))
            }
            _ => None,
        };

        Problem {
            title: self.title().to_string(),
            kind: self.kind(),
            cause,
        }
    }

    pub fn into_response_for(self, mode: Mode) -> Response {
        let mut response = (self.status(), Json(self.problem(mode))).into_response();
        if let GatewayError::Throttled {
            retry_after: Some(after),
        } = &self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(*after)));
        }
        response
    }
}

/// Whole seconds for `Retry-After`, rounded up, never zero.
pub(crate) fn retry_after_secs(after: Duration) -> u64 {
    let secs = after.as_secs() + u64::from(after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_for(Mode::Production)
    }
}
