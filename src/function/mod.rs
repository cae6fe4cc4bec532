//! User function interface.
//!
//! # Data Flow
//! ```text
//! bare handler fn  ──FunctionHandle::from_handler──┐
//!                                                  ├─▶ FunctionHandle (Arc<dyn Function>)
//! factory → object ──FunctionHandle::from_factory──┘
//!     → lifecycle::Adapter (start/stop/alive/ready)
//!     → dispatch::Dispatcher (handle)
//! ```
//!
//! # Design Decisions
//! - Both calling conventions end up behind one trait object, chosen once
//!   when the handle is built
//! - Optional operations return `None` by default; an override that returns
//!   `Some` is what makes the operation present
//! - One instance per process, shared by every request without locking

pub mod handle;

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::health::Health;
use crate::protocol::{MessageSource, ResponseSink, Scope};

pub use handle::{FunctionHandle, StaticFunction};

/// Failure raised by user code.
pub type FunctionError = Box<dyn StdError + Send + Sync + 'static>;

/// Process environment snapshot passed to [`Function::start`].
pub type Environment = BTreeMap<String, String>;

/// Boxed future returned by bare handler functions.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An instanced function: a `handle` operation plus optional lifecycle hooks.
///
/// The hooks return `None` when not implemented. The lifecycle falls back to
/// its defaults for those: no-op start and stop, healthy probes.
///
/// ```ignore
/// fn start<'a>(&'a self, env: &'a Environment) -> Option<BoxFuture<'a, Result<(), FunctionError>>> {
///     Some(Box::pin(async move { self.connect(env).await }))
/// }
///
/// fn alive(&self) -> Option<Health> {
///     Some((self.pool.is_healthy(), "pool").into())
/// }
/// ```
#[async_trait]
pub trait Function: Send + Sync + 'static {
    /// Serve one request. Returns once the response has been sent.
    async fn handle(
        &self,
        scope: &Scope,
        receive: &mut dyn MessageSource,
        send: &mut dyn ResponseSink,
    ) -> Result<(), FunctionError>;

    /// Called once before the first request.
    fn start<'a>(
        &'a self,
        _env: &'a Environment,
    ) -> Option<BoxFuture<'a, Result<(), FunctionError>>> {
        None
    }

    /// Called once at shutdown.
    fn stop(&self) -> Option<BoxFuture<'_, Result<(), FunctionError>>> {
        None
    }

    fn alive(&self) -> Option<Health> {
        None
    }

    fn ready(&self) -> Option<Health> {
        None
    }
}

/// Snapshot of the current process environment. Non-UTF-8 entries are skipped.
pub fn environment() -> Environment {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Human-readable text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
