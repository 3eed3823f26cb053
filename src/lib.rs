//! Request validation and throttling for axum services.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ cors ─▶ timeout ─▶ rate limiter
//!                                                                   │
//!                                   ┌───────────────────────────────┘
//!                                   ▼
//!                     ValidateLayer (body / query / params)
//!                                   │ decode → coerce → validate
//!                                   ▼
//!                     handler (ValidatedBody<T>, ValidatedQuery<T>, ...)
//!
//!     Any stage may answer early with a problem body:
//!         { "title": ..., "type": "ValidationError", "cause": [...] }
//! ```
//!
//! - [`gateway`]: schemas, decoders, coercion and the validation layer
//! - [`security`]: fixed-window rate limiter, client address, bearer auth
//! - [`http`]: app factory wiring the shared middleware stack
//! - [`config`], [`observability`], [`lifecycle`]: ambient plumbing

// Core
pub mod error;
pub mod gateway;
pub mod security;

// Plumbing
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use error::{GatewayError, Problem};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
