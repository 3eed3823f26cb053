//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML, and every
//! section has defaults so an empty file is a valid configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::DecoderKind;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// HTTP app settings (CORS, proxies, timeouts).
    pub http: HttpConfig,

    /// Request body handling.
    pub body: BodyConfig,

    /// Per-client throttling.
    pub rate_limit: RateLimitConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Development or production; controls diagnostic detail in error bodies.
    pub mode: Mode,
}

/// Runtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn is_production(&self) -> bool {
        matches!(self, Mode::Production)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port`, bracketing IPv6 hosts.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// HTTP app settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Allowed CORS origin. `None` or `"*"` allows any origin.
    pub cors_origin: Option<String>,

    /// Take the client address from `X-Forwarded-For` when the peer is a
    /// loopback, link-local or unique-local address.
    pub trust_proxies: bool,

    /// Total time allowed for one request, in seconds.
    pub request_timeout_secs: u64,

    /// Time allowed for in-flight requests to finish after shutdown starts.
    pub drain_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_origin: None,
            trust_proxies: true,
            request_timeout_secs: 30,
            drain_timeout_secs: 5,
        }
    }
}

/// Request body handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Largest accepted body in bytes.
    pub limit_bytes: usize,

    /// Decoders tried in order for validated bodies.
    pub decoders: Vec<DecoderKind>,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 100 * 1024,
            decoders: vec![DecoderKind::Json],
        }
    }
}

/// Fixed-window throttling per client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per window.
    pub limit: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Only responses with these statuses count as hits. Empty counts all.
    pub status_codes: Vec<u16>,

    /// How often expired windows are purged. Zero disables purging.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
            window_ms: 5000,
            status_codes: Vec::new(),
            sweep_interval_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON in production, human-readable otherwise.
    #[default]
    Auto,
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Auto,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.body.decoders, vec![DecoderKind::Json]);
        assert_eq!(config.rate_limit.limit, 100);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(5));
        assert_eq!(config.mode, Mode::Development);
    }

    #[test]
    fn test_partial_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            mode = "production"

            [listener]
            port = 3000

            [body]
            decoders = ["json", "form"]

            [rate_limit]
            limit = 5
            status_codes = [401]
            "#,
        )
        .unwrap();
        assert!(config.mode.is_production());
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.body.decoders, vec![DecoderKind::Json, DecoderKind::Form]);
        assert_eq!(config.rate_limit.limit, 5);
        assert_eq!(config.rate_limit.window_ms, 5000);
        assert_eq!(config.rate_limit.status_codes, vec![401]);
    }

    #[test]
    fn test_ipv6_bind_address() {
        let listener = ListenerConfig {
            host: "::1".to_string(),
            port: 8080,
        };
        assert_eq!(listener.bind_address(), "[::1]:8080");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("production".parse::<Mode>(), Ok(Mode::Production));
        assert_eq!("Dev".parse::<Mode>(), Ok(Mode::Development));
        assert!("staging".parse::<Mode>().is_err());
    }
}
