//! Fixed-window rate limiting per client.
//!
//! A request is admitted when its key has fewer than `limit` counted hits in
//! the current window. The hit is counted after the inner service responds,
//! and only when the response status passes the optional status filter, so
//! e.g. a login route can throttle on failed attempts alone. A request whose
//! future is dropped before responding is never counted.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower::{Layer, Service};

use crate::config::{Mode, ServiceConfig};
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::client_ip::client_ip;
use crate::security::store::{Admission, MemoryStore, ThrottleStore};

/// Derives the rate-limit key for a request. `None` falls back to a shared
/// `"unknown"` key.
pub type KeyFn = Arc<dyn Fn(&Request<Body>) -> Option<String> + Send + Sync>;

const UNKNOWN_KEY: &str = "unknown";

/// Key requests by client address.
pub fn by_client_ip(trust_proxies: bool) -> KeyFn {
    Arc::new(move |req: &Request<Body>| client_ip(req, trust_proxies).map(|ip| ip.to_string()))
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn ThrottleStore>,
    limit: u32,
    window: Duration,
    status_codes: Option<Arc<[StatusCode]>>,
    key: KeyFn,
    mode: Mode,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("status_codes", &self.status_codes)
            .field("tracked_keys", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// `limit` hits per `window`, keyed by client address with proxies trusted.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            limit,
            window,
            status_codes: None,
            key: by_client_ip(true),
            mode: Mode::Production,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        let rate_limit = &config.rate_limit;
        let limiter = Self::new(rate_limit.limit, rate_limit.window())
            .key_by_fn(by_client_ip(config.http.trust_proxies))
            .mode(config.mode);

        if rate_limit.status_codes.is_empty() {
            limiter
        } else {
            limiter.count_only(
                rate_limit
                    .status_codes
                    .iter()
                    .filter_map(|code| StatusCode::from_u16(*code).ok()),
            )
        }
    }

    /// Use `store` instead of a private in-memory one.
    pub fn with_store(mut self, store: Arc<dyn ThrottleStore>) -> Self {
        self.store = store;
        self
    }

    /// Count only responses with one of these statuses.
    pub fn count_only(mut self, codes: impl IntoIterator<Item = StatusCode>) -> Self {
        self.status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Derive keys with `key` instead of the client address.
    pub fn key_by<F>(self, key: F) -> Self
    where
        F: Fn(&Request<Body>) -> Option<String> + Send + Sync + 'static,
    {
        self.key_by_fn(Arc::new(key))
    }

    fn key_by_fn(mut self, key: KeyFn) -> Self {
        self.key = key;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn store(&self) -> &Arc<dyn ThrottleStore> {
        &self.store
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn key_for(&self, req: &Request<Body>) -> String {
        (self.key)(req).unwrap_or_else(|| UNKNOWN_KEY.to_string())
    }

    pub fn admit(&self, key: &str, now: Instant) -> Admission {
        self.store.admit(key, self.limit, self.window, now)
    }

    /// Count a finished request. Returns whether it was counted.
    pub fn complete(&self, key: &str, window: Instant, status: StatusCode) -> bool {
        let counts = self
            .status_codes
            .as_ref()
            .map_or(true, |codes| codes.contains(&status));
        counts && self.store.record_hit(key, window)
    }

    pub fn layer(&self) -> RateLimitLayer {
        RateLimitLayer {
            limiter: self.clone(),
        }
    }

    /// Purge lapsed windows every `every` until the store is dropped.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store: Weak<dyn ThrottleStore> = Arc::downgrade(&self.store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired(Instant::now());
                metrics::record_tracked_keys(store.len());
                if purged > 0 {
                    tracing::debug!(purged, remaining = store.len(), "Purged expired rate-limit windows");
                }
            }
        })
    }
}

/// Layer applying a [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
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
        let limiter = self.limiter.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let key = limiter.key_for(&req);

            match limiter.admit(&key, Instant::now()) {
                Admission::Allowed { window } => {
                    let response = inner.call(req).await?;
                    limiter.complete(&key, window, response.status());
                    Ok(response)
                }
                Admission::Rejected { retry_after } => {
                    tracing::warn!(
                        client = %key,
                        limit = limiter.limit,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited();
                    Ok(GatewayError::Throttled {
                        retry_after: Some(retry_after),
                    }
                    .into_response_for(limiter.mode))
                }
            }
        })
    }
}
