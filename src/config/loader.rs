//! Configuration loading from disk and the environment.
//!
//! Order of precedence, lowest first: built-in defaults, the optional TOML
//! file, then environment variables:
//!
//! | Variable             | Field                     |
//! |----------------------|---------------------------|
//! | `HTTP_HOST`          | `listener.host`           |
//! | `HTTP_PORT`          | `listener.port`           |
//! | `HTTP_CORS_ORIGIN`   | `http.cors_origin`        |
//! | `HTTP_TRUST_PROXIES` | `http.trust_proxies`      |
//! | `APP_MODE`           | `mode`                    |

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Mode, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {name}: {message}")]
    Env { name: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file plus the process
/// environment, then validate it.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("HTTP_HOST") {
        config.listener.host = host;
    }
    if let Some(port) = lookup("HTTP_PORT") {
        config.listener.port = port.trim().parse().map_err(|_| ConfigError::Env {
            name: "HTTP_PORT",
            message: format!("'{port}' is not a port number"),
        })?;
    }
    if let Some(origin) = lookup("HTTP_CORS_ORIGIN") {
        config.http.cors_origin = Some(origin);
    }
    if let Some(trust) = lookup("HTTP_TRUST_PROXIES") {
        config.http.trust_proxies = parse_bool(&trust).ok_or_else(|| ConfigError::Env {
            name: "HTTP_TRUST_PROXIES",
            message: format!("'{trust}' is not a boolean"),
        })?;
    }
    if let Some(mode) = lookup("APP_MODE") {
        config.mode = mode
            .parse::<Mode>()
            .map_err(|message| ConfigError::Env { name: "APP_MODE", message })?;
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServiceConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("HTTP_HOST", "127.0.0.1"),
                ("HTTP_PORT", "3000"),
                ("HTTP_CORS_ORIGIN", "https://app.example.com"),
                ("HTTP_TRUST_PROXIES", "false"),
                ("APP_MODE", "production"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.http.cors_origin.as_deref(), Some("https://app.example.com"));
        assert!(!config.http.trust_proxies);
        assert_eq!(config.mode, Mode::Production);
    }

    #[test]
    fn test_missing_env_keeps_values() {
        let mut config = ServiceConfig::default();
        apply_env(&mut config, env(&[])).unwrap();
        assert_eq!(config.listener.port, 8080);
        assert!(config.http.trust_proxies);
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = ServiceConfig::default();
        let err = apply_env(&mut config, env(&[("HTTP_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { name: "HTTP_PORT", .. }));

        let err = apply_env(&mut config, env(&[("HTTP_TRUST_PROXIES", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { name: "HTTP_TRUST_PROXIES", .. }));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("request-gate-{}.toml", std::process::id()));
        std::fs::write(&path, "[listener]\nport = 9999\n[rate_limit]\nlimit = 3\n").unwrap();

        let mut config: ServiceConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        apply_env(&mut config, env(&[])).unwrap();
        assert_eq!(config.listener.port, 9999);
        assert_eq!(config.rate_limit.limit, 3);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
