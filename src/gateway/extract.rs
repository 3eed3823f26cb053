//! Typed access to validated request parts.
//!
//! [`ValidateLayer`](crate::gateway::ValidateLayer) stores each conforming
//! value in the request extensions under a per-target marker. The extractors
//! here read it back and deserialize it into the handler's type.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Extensions},
    response::Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Mode;
use crate::error::GatewayError;
use crate::gateway::Target;

#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyTarget;

#[derive(Debug, Clone, Copy)]
pub(crate) struct QueryTarget;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ParamsTarget;

pub(crate) trait Marker: Clone + Send + Sync + 'static {
    const TARGET: Target;
}

impl Marker for BodyTarget {
    const TARGET: Target = Target::Body;
}

impl Marker for QueryTarget {
    const TARGET: Target = Target::Query;
}

impl Marker for ParamsTarget {
    const TARGET: Target = Target::Params;
}

/// A schema-conforming value for one request part.
#[derive(Debug, Clone)]
pub(crate) struct Validated<M> {
    value: Value,
    _target: PhantomData<M>,
}

impl<M: Marker> Validated<M> {
    fn new(value: Value) -> Self {
        Self {
            value,
            _target: PhantomData,
        }
    }
}

/// Store `value` as the validated result for `target`.
pub(crate) fn attach(extensions: &mut Extensions, target: Target, value: Value) {
    match target {
        Target::Body => {
            extensions.insert(Validated::<BodyTarget>::new(value));
        }
        Target::Query => {
            extensions.insert(Validated::<QueryTarget>::new(value));
        }
        Target::Params => {
            extensions.insert(Validated::<ParamsTarget>::new(value));
        }
    }
}

fn take<M: Marker, T: DeserializeOwned>(parts: &mut Parts) -> Result<T, Response> {
    let mode = parts.extensions.get::<Mode>().copied().unwrap_or(Mode::Production);
    let target = M::TARGET;

    let validated = parts.extensions.remove::<Validated<M>>().ok_or_else(|| {
        tracing::error!(%target, "validated value missing; is the validate layer applied?");
        GatewayError::internal(format!("no validated {target} on this request"))
            .into_response_for(mode)
    })?;

    serde_json::from_value(validated.value).map_err(|err| {
        tracing::error!(%target, error = %err, "validated value does not fit handler type");
        GatewayError::internal(format!("validated {target} cannot be deserialized: {err}"))
            .into_response_for(mode)
    })
}

/// Validated request body, deserialized as `T`.
#[derive(Debug, Clone)]
pub struct ValidatedBody<T>(pub T);

/// Validated and coerced query parameters, deserialized as `T`.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

/// Validated path parameters, deserialized as `T`.
#[derive(Debug, Clone)]
pub struct ValidatedParams<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        take::<BodyTarget, T>(parts).map(ValidatedBody)
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        take::<QueryTarget, T>(parts).map(ValidatedQuery)
    }
}

impl<S, T> FromRequestParts<S> for ValidatedParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        take::<ParamsTarget, T>(parts).map(ValidatedParams)
    }
}
