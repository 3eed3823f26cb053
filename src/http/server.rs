//! HTTP app factory and server.
//!
//! # Responsibilities
//! - Wrap caller routes with the shared middleware stack
//! - Render unmatched routes and panics as problem responses
//! - Serve with graceful shutdown and a drain deadline
//!
//! Middleware, outermost first: request id (set, propagate), trace span,
//! CORS, mode extension, panic catcher, timeout, rate limiter.

use std::any::Any;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request},
    response::Response,
    Extension, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Mode, ServiceConfig};
use crate::error::GatewayError;
use crate::http::request::{request_id_header, RequestIdExt};
use crate::lifecycle::shutdown;
use crate::security::RateLimiter;

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    limiter: Option<RateLimiter>,
}

impl HttpServer {
    /// Wrap `routes` with the app middleware described by `config`.
    pub fn new(config: ServiceConfig, routes: Router) -> Self {
        let limiter = config
            .rate_limit
            .enabled
            .then(|| RateLimiter::from_config(&config));
        let router = Self::build_router(&config, routes, limiter.as_ref());
        Self {
            router,
            config,
            limiter,
        }
    }

    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, routes: Router, limiter: Option<&RateLimiter>) -> Router {
        let mode = config.mode;
        let mut router = routes.fallback(move || async move {
            GatewayError::NotFound.into_response_for(mode)
        });

        if let Some(limiter) = limiter {
            router = router.layer(limiter.layer());
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.http.request_timeout_secs,
            )))
            .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
                panic_response(panic, mode)
            }))
            .layer(Extension(mode))
            .layer(cors_layer(config.http.cors_origin.as_deref()))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = req.request_id().unwrap_or("-"),
                )
            }))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
    }

    /// The fully layered router, for driving with `tower::ServiceExt`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then drain for up to the configured
    /// deadline.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, mode = %self.config.mode, "HTTP server starting");

        let sweeper = match (&self.limiter, self.config.rate_limit.sweep_interval_secs) {
            (Some(limiter), secs) if secs > 0 => {
                Some(limiter.spawn_sweeper(Duration::from_secs(secs)))
            }
            _ => None,
        };

        let drain = Duration::from_secs(self.config.http.drain_timeout_secs);
        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let signal = async move {
            shutdown::wait(shutdown).await;
            tracing::info!("Shutdown requested, draining connections");
            let _ = draining_tx.send(());
        };

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let serve = axum::serve(listener, app).with_graceful_shutdown(signal);
        let mut serve = std::pin::pin!(serve.into_future());

        let deadline = async move {
            if draining_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(drain).await;
        };

        tokio::select! {
            result = &mut serve => result?,
            _ = deadline => {
                tracing::warn!(timeout_secs = drain.as_secs(), "Drain deadline passed, closing open connections");
            }
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, mode: Mode) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "handler panicked".to_string());
    tracing::error!(panic = %detail, "Handler panicked");
    GatewayError::internal(detail).into_response_for(mode)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AnyOrigin);

    match origin {
        None | Some("*") => layer.allow_origin(AnyOrigin),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(origin) => layer.allow_origin(origin),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin; cross-origin requests denied");
                layer
            }
        },
    }
}
