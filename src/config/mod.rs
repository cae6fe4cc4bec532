//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → LISTEN_ADDRESS environment override
//!     → command-line overrides (loader::Overrides)
//!     → validation.rs (semantic checks, once, on the final values)
//!     → RuntimeConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, Overrides};
pub use schema::{ListenerConfig, LogFormat, Mode, ObservabilityConfig, RuntimeConfig, TimeoutConfig};
pub use validation::{validate_config, ValidationError};
