//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_rejections_total` (counter): rejected requests by problem `kind`
//! - `gateway_validated_total` (counter): accepted request parts by `target`
//! - `rate_limit_rejections_total` (counter): throttled requests
//! - `rate_limit_tracked_keys` (gauge): keys held by the limiter store
//!
//! Recording without an installed recorder is a no-op, so library users and
//! tests need no setup.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::error::ErrorKind;
use crate::gateway::Target;

/// Install the Prometheus recorder and serve it over HTTP on `addr`.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_rejection(kind: ErrorKind) {
    counter!("gateway_rejections_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_validated(target: Target) {
    counter!("gateway_validated_total", "target" => target.as_str()).increment(1);
}

pub fn record_rate_limited() {
    counter!("rate_limit_rejections_total").increment(1);
    record_rejection(ErrorKind::Throttled);
}

pub fn record_tracked_keys(count: usize) {
    gauge!("rate_limit_tracked_keys").set(count as f64);
}
