//! Request identification.
//!
//! # Responsibilities
//! - Name the request id header shared by the set/propagate layers
//! - Read the id back for spans and handlers
//!
//! # Design Decisions
//! - Request id added as early as possible for tracing
//! - A client-supplied id is kept, not replaced

use axum::http::{HeaderName, Request};

pub const X_REQUEST_ID: &str = "x-request-id";

pub fn request_id_header() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// Access to the request id assigned by the app.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
    }
}
