//! Bridges a [`FunctionHandle`]'s optional hooks into the lifecycle protocol.
//!
//! # Responsibilities
//! - Run start/stop when the function provides them, skip them otherwise
//! - Answer probes, defaulting to healthy, treating a panic as unhealthy
//! - Flag shutdown completion whether or not a stop hook exists
//!
//! A hook is present when the function's override returns `Some`; there is
//! no separate declaration to keep in sync.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::Instrument;

use crate::function::{panic_message, BoxFuture, Environment, Function, FunctionError, FunctionHandle};
use crate::health::{Health, Probe};
use crate::observability::metrics;

pub struct Adapter {
    function: FunctionHandle,
    stopped: watch::Sender<bool>,
    alive_defaulted: AtomicBool,
    ready_defaulted: AtomicBool,
    span: tracing::Span,
}

impl Adapter {
    pub fn new(function: FunctionHandle) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            function,
            stopped,
            alive_defaulted: AtomicBool::new(false),
            ready_defaulted: AtomicBool::new(false),
            span: tracing::info_span!("lifecycle"),
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn function(&self) -> &FunctionHandle {
        &self.function
    }

    /// Run the start hook with `env`, if the function has one.
    pub async fn on_start(&self, env: &Environment) -> Result<(), FunctionError> {
        let hook = hook_future(|| self.function.function().start(env));
        self.run_hook("start", hook).await
    }

    /// Run the stop hook, if the function has one, then flag shutdown complete.
    pub async fn on_stop(&self) -> Result<(), FunctionError> {
        let hook = hook_future(|| self.function.function().stop());
        let result = self.run_hook("stop", hook).await;
        self.stopped.send_replace(true);
        result
    }

    async fn run_hook(
        &self,
        name: &'static str,
        hook: Result<Option<BoxFuture<'_, Result<(), FunctionError>>>, FunctionError>,
    ) -> Result<(), FunctionError> {
        let result = match hook {
            Ok(Some(future)) => guarded(future).instrument(self.span.clone()).await,
            Ok(None) => {
                self.span
                    .in_scope(|| tracing::debug!(hook = name, "function has no {name} hook, skipping"));
                return Ok(());
            }
            Err(e) => Err(e),
        };
        metrics::record_hook(name, result.is_ok());
        result
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolves once [`on_stop`](Self::on_stop) has finished.
    pub fn stopped(&self) -> watch::Receiver<bool> {
        self.stopped.subscribe()
    }

    pub fn check(&self, probe: Probe) -> Health {
        match probe {
            Probe::Liveness => self.check_liveness(),
            Probe::Readiness => self.check_readiness(),
        }
    }

    pub fn check_liveness(&self) -> Health {
        self.probe(Probe::Liveness, &self.alive_defaulted, |f| f.alive())
    }

    pub fn check_readiness(&self) -> Health {
        self.probe(Probe::Readiness, &self.ready_defaulted, |f| f.ready())
    }

    fn probe(
        &self,
        probe: Probe,
        defaulted: &AtomicBool,
        call: impl FnOnce(&dyn Function) -> Option<Health>,
    ) -> Health {
        let function = self.function.function();
        let health = match catch_unwind(AssertUnwindSafe(|| call(function))) {
            Ok(Some(health)) => health,
            Ok(None) => {
                if !defaulted.swap(true, Ordering::Relaxed) {
                    let hook = match probe {
                        Probe::Liveness => "alive",
                        Probe::Readiness => "ready",
                    };
                    self.span.in_scope(|| {
                        tracing::info!("function does not implement {hook}, using default implementation")
                    });
                }
                return Health::healthy();
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                let _enter = self.span.enter();
                tracing::error!(probe = %probe, panic = %message, "health hook panicked");
                Health::unhealthy(message)
            }
        };
        metrics::record_hook(probe.as_str(), health.healthy);
        health
    }
}

/// Ask the function for a hook future, turning a panic while building it
/// into an error.
fn hook_future<'a>(
    build: impl FnOnce() -> Option<BoxFuture<'a, Result<(), FunctionError>>>,
) -> Result<Option<BoxFuture<'a, Result<(), FunctionError>>>, FunctionError> {
    catch_unwind(AssertUnwindSafe(build))
        .map_err(|payload| format!("hook panicked: {}", panic_message(&*payload)).into())
}

/// Await a hook, turning a panic into an error.
async fn guarded<F>(hook: F) -> Result<(), FunctionError>
where
    F: std::future::Future<Output = Result<(), FunctionError>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(format!("hook panicked: {}", panic_message(&*payload)).into()),
    }
}
