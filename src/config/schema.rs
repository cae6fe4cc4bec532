//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every section defaults so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Default listen address in plain HTTP mode.
pub const DEFAULT_HTTP_LISTEN: &str = "[::]:8080";

/// Default listen address in event mode (explicit IPv4 companion).
pub const DEFAULT_EVENT_LISTEN: &str = "[::]:8080,0.0.0.0:8080";

/// Root configuration for the runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Serving mode.
    pub mode: Mode,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RuntimeConfig {
    /// Defaults for the given mode.
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// The configured listen address, or the mode's default.
    pub fn listen_address(&self) -> &str {
        match &self.listener.listen_address {
            Some(address) => address,
            None => self.mode.default_listen_address(),
        }
    }
}

/// Whether request bodies are decoded as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Requests reach the handler untouched.
    #[default]
    Http,
    /// Requests are decoded into events; responses are expected to be events.
    #[serde(alias = "cloudevent")]
    Event,
}

impl Mode {
    pub fn default_listen_address(&self) -> &'static str {
        match self {
            Mode::Http => DEFAULT_HTTP_LISTEN,
            Mode::Event => DEFAULT_EVENT_LISTEN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Http => "http",
            Mode::Event => "event",
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Comma-separated `host:port` / `[ipv6]:port` list. `None` uses the
    /// mode's default.
    pub listen_address: Option<String>,

    /// Listen backlog per socket.
    pub backlog: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            backlog: 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for in-flight requests to finish at shutdown.
    pub drain_secs: u64,

    /// Upper bound for the start hook.
    pub startup_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            drain_secs: 30,
            startup_secs: 30,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub log_filter: String,

    pub log_format: LogFormat,

    /// Prometheus scrape endpoint. Disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "func_runtime=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}
