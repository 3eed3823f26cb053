//! HTTP app subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, shared middleware, 404 / panic problems)
//!     → request.rs (request id header)
//!     → caller routes with gateway / security layers
//!     → handler
//! ```

pub mod request;
pub mod routes;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
