//! Configuration loading: file, then environment, then command-line
//! overrides, then validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Mode, RuntimeConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `listener.listen_address`.
pub const LISTEN_ADDRESS_ENV: &str = "LISTEN_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line values that win over both the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub listen_address: Option<String>,
}

impl Overrides {
    fn apply(&self, config: &mut RuntimeConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(address) = &self.listen_address {
            config.listener.listen_address = Some(address.clone());
        }
    }
}

/// Load configuration: TOML file when given, defaults otherwise, then
/// environment overrides, then `overrides`. Validation runs once, on the
/// final result.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<RuntimeConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok(), overrides)
}

fn load_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
    overrides: &Overrides,
) -> Result<RuntimeConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => RuntimeConfig::default(),
    };
    apply_env(&mut config, lookup);
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<RuntimeConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides read through `lookup`.
pub fn apply_env(config: &mut RuntimeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(address) = lookup(LISTEN_ADDRESS_ENV).filter(|a| !a.trim().is_empty()) {
        tracing::debug!(address = %address, "listen address taken from {LISTEN_ADDRESS_ENV}");
        config.listener.listen_address = Some(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_file() {
        let mut config = parse_config("[listener]\nlisten_address = \"127.0.0.1:1\"").unwrap();
        apply_env(&mut config, |key| {
            (key == LISTEN_ADDRESS_ENV).then(|| "127.0.0.1:2".to_string())
        });
        assert_eq!(config.listen_address(), "127.0.0.1:2");
    }

    #[test]
    fn blank_env_is_ignored() {
        let mut config = RuntimeConfig::for_mode(Mode::Event);
        apply_env(&mut config, |_| Some("  ".to_string()));
        assert_eq!(config.listen_address(), "[::]:8080,0.0.0.0:8080");
    }

    #[test]
    fn parse_errors_surface() {
        assert!(matches!(parse_config("mode = 3"), Err(ConfigError::Parse(_))));
        assert!(matches!(parse_config("mode = \"grpc\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_config(
            Some(Path::new("/nonexistent/func-runtime.toml")),
            &Overrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn listen_flag_replaces_malformed_env_before_validation() {
        let overrides = Overrides {
            mode: Some(Mode::Event),
            listen_address: Some("127.0.0.1:0".to_string()),
        };
        let config = load_with(None, |_| Some("no-port-here".to_string()), &overrides).unwrap();
        assert_eq!(config.mode, Mode::Event);
        assert_eq!(config.listen_address(), "127.0.0.1:0");
    }

    #[test]
    fn malformed_env_without_flag_fails_validation() {
        let result = load_with(None, |_| Some("no-port-here".to_string()), &Overrides::default());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
