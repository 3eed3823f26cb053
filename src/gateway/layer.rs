//! Validation middleware.
//!
//! One [`ValidateLayer`] checks one part of the request. Stack several on a
//! route to validate body, query and path parameters together:
//!
//! ```rust,ignore
//! Router::new().route(
//!     "/items/{id}",
//!     post(handler)
//!         .route_layer(ValidateLayer::body(item_schema))
//!         .route_layer(ValidateLayer::params(id_schema)),
//! )
//! ```
//!
//! Path parameters are only known after routing, so the params layer must be
//! applied with `route_layer` or on a method router.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::{rejection::RawPathParamsRejection, FromRequestParts, RawPathParams},
    http::{header, request::Parts, Extensions, Request},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use tower::{Layer, Service};

use crate::config::{Mode, ServiceConfig};
use crate::error::GatewayError;
use crate::gateway::decoders::Decoders;
use crate::gateway::extract::attach;
use crate::gateway::schema::Schema;
use crate::gateway::validate::MAX_DEPTH;
use crate::gateway::{decode_body, parse_params, parse_query_str, select_decoder, Target};
use crate::observability::metrics;

const DEFAULT_BODY_LIMIT: usize = 100 * 1024;

#[derive(Debug, Clone)]
enum Source {
    Body { decoders: Decoders, limit: usize },
    Query,
    Params,
}

#[derive(Debug, Clone)]
struct Stage {
    source: Source,
    schema: Schema,
    mode: Option<Mode>,
}

impl Stage {
    fn target(&self) -> Target {
        match self.source {
            Source::Body { .. } => Target::Body,
            Source::Query => Target::Query,
            Source::Params => Target::Params,
        }
    }

    /// An explicit mode wins over the one the app installs.
    fn mode_for(&self, extensions: &Extensions) -> Mode {
        self.mode
            .or_else(|| extensions.get::<Mode>().copied())
            .unwrap_or(Mode::Production)
    }

    /// Validate the request part and hand back the body to forward.
    async fn apply(&self, parts: &mut Parts, body: Body) -> Result<Body, Response> {
        let mode = self.mode_for(&parts.extensions);
        let target = self.target();

        let (value, body) = match &self.source {
            Source::Body { decoders, limit } => {
                let content_type = parts
                    .headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok());
                // Unsupported bodies are refused before any of them is read.
                let decoder = select_decoder(content_type, decoders)
                    .map_err(|err| reject(parts, target, err, mode))?;
                let bytes = read_body(body, *limit)
                    .await
                    .map_err(|err| reject(parts, target, err, mode))?;
                let value = decode_body(&bytes, decoder, &self.schema)
                    .map_err(|err| reject(parts, target, err, mode))?;
                (value, Body::from(bytes))
            }
            Source::Query => {
                let query = parts.uri.query().unwrap_or_default();
                let value = parse_query_str(query, &self.schema)
                    .map_err(|err| reject(parts, target, err, mode))?;
                (value, body)
            }
            Source::Params => {
                let raw = path_params(parts).await?;
                let value = parse_params(raw, &self.schema)
                    .map_err(|err| reject(parts, target, err, mode))?;
                (value, body)
            }
        };

        metrics::record_validated(target);
        attach(&mut parts.extensions, target, value);
        Ok(body)
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        if exceeds_limit(&err) {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::MalformedRequestBody {
                decoder: "body",
                diagnostic: err.to_string(),
            }
        }
    })
}

fn exceeds_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

async fn path_params(parts: &mut Parts) -> Result<Value, Response> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => Ok(Value::Object(
            params
                .iter()
                .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                .collect(),
        )),
        Err(RawPathParamsRejection::MissingPathParams(_)) => Ok(Value::Object(Map::new())),
        Err(rejection) => Err(rejection.into_response()),
    }
}

fn reject(parts: &Parts, target: Target, err: GatewayError, mode: Mode) -> Response {
    let kind = err.kind();
    match &err {
        GatewayError::Internal { message } => {
            tracing::error!(%target, path = %parts.uri.path(), error = %message, "Validation aborted");
        }
        GatewayError::Validation { issues, .. } => {
            tracing::debug!(
                %target,
                path = %parts.uri.path(),
                issues = issues.len(),
                "Request rejected by schema"
            );
        }
        _ => {
            tracing::warn!(%target, path = %parts.uri.path(), error = %err, "Request rejected");
        }
    }
    metrics::record_rejection(kind);
    err.into_response_for(mode)
}

/// Layer validating one part of the request against a [`Schema`].
#[derive(Debug, Clone)]
pub struct ValidateLayer {
    stage: Arc<Stage>,
}

impl ValidateLayer {
    fn new(source: Source, schema: Schema) -> Self {
        let depth = schema.depth();
        if depth > MAX_DEPTH {
            tracing::warn!(
                depth,
                max_depth = MAX_DEPTH,
                "Schema nests deeper than the validator walks; matching requests will fail"
            );
        }
        Self {
            stage: Arc::new(Stage {
                source,
                schema,
                mode: None,
            }),
        }
    }

    /// Validate a JSON body.
    pub fn body(schema: Schema) -> Self {
        Self::body_with(schema, Decoders::default())
    }

    /// Validate a body decoded by the first matching decoder in `decoders`.
    pub fn body_with(schema: Schema, decoders: Decoders) -> Self {
        Self::new(
            Source::Body {
                decoders,
                limit: DEFAULT_BODY_LIMIT,
            },
            schema,
        )
    }

    pub fn query(schema: Schema) -> Self {
        Self::new(Source::Query, schema)
    }

    pub fn params(schema: Schema) -> Self {
        Self::new(Source::Params, schema)
    }

    /// Fix the mode used to render rejections instead of reading it from the
    /// request.
    pub fn mode(mut self, mode: Mode) -> Self {
        Arc::make_mut(&mut self.stage).mode = Some(mode);
        self
    }

    /// Largest accepted body in bytes. Ignored for query and params.
    pub fn limit(mut self, bytes: usize) -> Self {
        if let Source::Body { limit, .. } = &mut Arc::make_mut(&mut self.stage).source {
            *limit = bytes;
        }
        self
    }

    /// Apply mode, body limit and decoder chain from configuration.
    pub fn configure(mut self, config: &ServiceConfig) -> Self {
        let stage = Arc::make_mut(&mut self.stage);
        stage.mode = Some(config.mode);
        if let Source::Body { decoders, limit } = &mut stage.source {
            *decoders = Decoders::from_kinds(&config.body.decoders);
            *limit = config.body.limit_bytes;
        }
        self
    }

    pub fn target(&self) -> Target {
        self.stage.target()
    }

    pub fn schema(&self) -> &Schema {
        &self.stage.schema
    }
}

impl<S> Layer<S> for ValidateLayer {
    type Service = ValidateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ValidateService {
            inner,
            stage: self.stage.clone(),
        }
    }
}

/// Service produced by [`ValidateLayer`].
#[derive(Debug, Clone)]
pub struct ValidateService<S> {
    inner: S,
    stage: Arc<Stage>,
}

impl<S> Service<Request<Body>> for ValidateService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let stage = self.stage.clone();
        // The ready service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            match stage.apply(&mut parts, body).await {
                Ok(body) => inner.call(Request::from_parts(parts, body)).await,
                Err(response) => Ok(response),
            }
        })
    }
}
