//! Top-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::net::{AddressError, NoSocketsBoundError};

/// Errors that stop the runtime from starting or serving.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid listen address: {0}")]
    Address(#[from] AddressError),

    #[error(transparent)]
    Bind(#[from] NoSocketsBoundError),

    /// The start hook failed or did not finish in time.
    #[error("function failed to start: {0}")]
    StartupFailed(String),

    /// The lifespan connection misbehaved.
    #[error("lifespan protocol error: {0}")]
    Lifespan(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
