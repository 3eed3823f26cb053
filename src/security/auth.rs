//! Bearer token authentication.
//!
//! Enforces `Authorization: Bearer <token>` on a route. The token is handed to
//! a [`TokenVerifier`]; the identity it returns is attached to the request and
//! read by handlers through [`Authenticated`].

use std::future::Future;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::config::Mode;
use crate::error::GatewayError;
use crate::observability::metrics;

/// Token from an `Authorization: Bearer` header. The scheme is matched
/// case-insensitively; an empty token counts as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Checks a bearer token and resolves it to an identity.
pub trait TokenVerifier: Clone + Send + Sync + 'static {
    type Identity: Clone + Send + Sync + 'static;

    /// `None` means the token is not acceptable.
    fn verify(&self, token: String) -> impl Future<Output = Option<Self::Identity>> + Send;
}

impl<F, Fut, I> TokenVerifier for F
where
    F: Fn(String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Option<I>> + Send,
    I: Clone + Send + Sync + 'static,
{
    type Identity = I;

    fn verify(&self, token: String) -> impl Future<Output = Option<I>> + Send {
        self(token)
    }
}

/// State for [`require_bearer`].
#[derive(Debug, Clone)]
pub struct AuthState<V> {
    verifier: V,
    mode: Mode,
}

impl<V: TokenVerifier> AuthState<V> {
    pub fn new(verifier: V) -> Self {
        Self {
            verifier,
            mode: Mode::Production,
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Middleware rejecting requests without a valid bearer token.
///
/// ```rust,ignore
/// router.route_layer(middleware::from_fn_with_state(
///     AuthState::new(ApiKeys::load()?),
///     require_bearer::<ApiKeys>,
/// ));
/// ```
pub async fn require_bearer<V: TokenVerifier>(
    State(state): State<AuthState<V>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
        tracing::debug!(path = %req.uri().path(), "Missing bearer token");
        return reject(GatewayError::MissingAuthorization, state.mode);
    };

    match state.verifier.verify(token).await {
        Some(identity) => {
            req.extensions_mut().insert(Authenticated(identity));
            next.run(req).await
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "Bearer token rejected");
            reject(GatewayError::AccessDenied, state.mode)
        }
    }
}

fn reject(err: GatewayError, mode: Mode) -> Response {
    metrics::record_rejection(err.kind());
    err.into_response_for(mode)
}

/// Identity resolved by [`require_bearer`].
#[derive(Debug, Clone)]
pub struct Authenticated<T>(pub T);

impl<S, T> FromRequestParts<S> for Authenticated<T>
where
    S: Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mode = parts.extensions.get::<Mode>().copied().unwrap_or(Mode::Production);
        parts
            .extensions
            .get::<Authenticated<T>>()
            .cloned()
            .ok_or_else(|| GatewayError::MissingAuthorization.into_response_for(mode))
    }
}
