//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the output format from config and mode
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - JSON in production, human-readable otherwise, unless forced by config

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, Mode, ObservabilityConfig};

/// Filter directive for the configured level.
pub fn default_directive(level: &str) -> String {
    format!("request_gate={level},tower_http={level}")
}

pub fn init_logging(
    config: &ObservabilityConfig,
    mode: Mode,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let json = match config.log_format {
        LogFormat::Json => true,
        LogFormat::Pretty => false,
        LogFormat::Auto => mode.is_production(),
    };

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init()?;
    }

    tracing::debug!(level = %config.log_level, json, %mode, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("debug");
        assert_eq!(directive, "request_gate=debug,tower_http=debug");
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
