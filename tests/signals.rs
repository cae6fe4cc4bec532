//! Shutdown driven by a real SIGTERM.
//!
//! Kept in its own test binary: the signal is delivered to the whole process.

#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use func_runtime::{
    BoxFuture, Function, FunctionError, FunctionHandle, MessageSource, Mode, ResponseSink,
    Runtime, Scope,
};
use tokio::signal::unix::{signal, SignalKind};

mod common;

#[derive(Default)]
struct CountsStops {
    stops: Arc<AtomicUsize>,
}

#[async_trait]
impl Function for CountsStops {
    async fn handle(
        &self,
        _scope: &Scope,
        _receive: &mut dyn MessageSource,
        send: &mut dyn ResponseSink,
    ) -> Result<(), FunctionError> {
        send.respond_text(StatusCode::OK, "ok".into()).await?;
        Ok(())
    }

    fn stop(&self) -> Option<BoxFuture<'_, Result<(), FunctionError>>> {
        Some(Box::pin(async move {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }
}

fn send_sigterm() {
    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .expect("run kill");
    assert!(status.success());
}

#[tokio::test]
async fn sigterm_runs_stop_once_and_serve_returns() {
    // Installing a listener first replaces the default disposition, so an
    // early SIGTERM cannot kill the test process.
    let mut guard = signal(SignalKind::terminate()).unwrap();

    let function = CountsStops::default();
    let stops = function.stops.clone();
    let runtime = Runtime::bind(FunctionHandle::from_instance(function), common::config(Mode::Http))
        .unwrap();
    let addr = runtime.local_addrs()[0];
    let mut serving = tokio::spawn(runtime.serve());
    common::wait_until_serving(addr).await;

    // The runtime subscribes to SIGTERM once serving starts; repeat until it
    // has seen one.
    let mut result = None;
    for _ in 0..50 {
        send_sigterm();
        guard.recv().await;
        if let Ok(joined) = tokio::time::timeout(Duration::from_millis(200), &mut serving).await {
            result = Some(joined.unwrap());
            break;
        }
    }

    let result = result.expect("serve did not return after SIGTERM");
    assert!(result.is_ok(), "serve failed: {result:?}");
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}
