//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (peer address, X-Forwarded-For behind trusted proxies)
//!     → rate_limit.rs (admit against the per-key window in store.rs)
//!     → auth.rs (bearer token → verifier → Authenticated<T>)
//!     → handler
//!     → rate_limit.rs (count the hit once the status is known)
//! ```
//!
//! # Design Decisions
//! - Limiter state lives in an injectable store, never in globals
//! - Rejections render through the shared problem format
//! - Fail closed: a request with no usable key shares the "unknown" bucket

pub mod auth;
pub mod client_ip;
pub mod rate_limit;
pub mod store;

pub use auth::{bearer_token, require_bearer, AuthState, Authenticated, TokenVerifier};
pub use client_ip::client_ip;
pub use rate_limit::{by_client_ip, KeyFn, RateLimitLayer, RateLimiter};
pub use store::{Admission, ClientEntry, MemoryStore, ThrottleStore};
