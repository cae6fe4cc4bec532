//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: RuntimeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RuntimeConfig;
use crate::net::address;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field, message: String| errors.push(ValidationError { field, message });

    match address::plan(config.listen_address()) {
        Ok(specs) if specs.is_empty() => fail(
            "listener.listen_address",
            "no usable TCP address in the list".to_string(),
        ),
        Ok(_) => {}
        Err(e) => fail("listener.listen_address", e.to_string()),
    }

    if config.listener.backlog == 0 {
        fail("listener.backlog", "must be greater than zero".to_string());
    }
    if config.timeouts.drain_secs == 0 {
        fail("timeouts.drain_secs", "must be greater than zero".to_string());
    }
    if config.timeouts.startup_secs == 0 {
        fail("timeouts.startup_secs", "must be greater than zero".to_string());
    }
    if let Some(metrics) = &config.observability.metrics_address {
        if let Err(e) = metrics.parse::<SocketAddr>() {
            fail("observability.metrics_address", format!("`{metrics}`: {e}"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut config = RuntimeConfig::default();
        config.listener.listen_address = Some("localhost".into());
        config.listener.backlog = 0;
        config.observability.metrics_address = Some("nope".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            ["listener.listen_address", "listener.backlog", "observability.metrics_address"]
        );
    }

    #[test]
    fn unix_only_list_has_no_usable_address() {
        let mut config = RuntimeConfig::default();
        config.listener.listen_address = Some("unix:///tmp/func.sock".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "listener.listen_address");
    }
}
