//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gateway, security, http:
//!     → logging.rs (structured tracing events, request-id spans)
//!     → metrics.rs (rejection / validation / throttle counters)
//!
//! Consumers:
//!     → stdout (JSON in production)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
