//! Startup and shutdown behavior of the runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use func_runtime::function::Environment;
use func_runtime::{
    BoxFuture, Error, Function, FunctionError, FunctionHandle, MessageSource, Mode, ResponseSink,
    Runtime, Scope,
};

mod common;

#[derive(Default)]
struct Lifecycle {
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    refuse_start: bool,
}

#[async_trait]
impl Function for Lifecycle {
    async fn handle(
        &self,
        scope: &Scope,
        _receive: &mut dyn MessageSource,
        send: &mut dyn ResponseSink,
    ) -> Result<(), FunctionError> {
        if scope.path() == "/slow" {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        send.respond_text(StatusCode::OK, "done".into()).await?;
        Ok(())
    }

    fn start<'a>(&'a self, env: &'a Environment) -> Option<BoxFuture<'a, Result<(), FunctionError>>> {
        Some(Box::pin(async move {
            if self.refuse_start {
                return Err("missing credentials".into());
            }
            assert!(!env.is_empty());
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    fn stop(&self) -> Option<BoxFuture<'_, Result<(), FunctionError>>> {
        Some(Box::pin(async move {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }
}

#[tokio::test]
async fn shutdown_runs_stop_once_and_serve_returns() {
    let function = Lifecycle::default();
    let (starts, stops) = (function.starts.clone(), function.stops.clone());
    let server = common::spawn(FunctionHandle::from_instance(function), Mode::Http).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    server.shutdown().await.unwrap();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn in_flight_request_completes_during_drain() {
    let server = common::spawn(FunctionHandle::from_instance(Lifecycle::default()), Mode::Http).await;

    let url = server.url("/slow");
    let request = tokio::spawn(async move { reqwest::get(url).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.shutdown().await.unwrap();
    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "done");
}

#[tokio::test]
async fn failed_start_aborts_serving() {
    let function = Lifecycle {
        refuse_start: true,
        ..Lifecycle::default()
    };
    let runtime = Runtime::bind(FunctionHandle::from_instance(function), common::config(Mode::Http))
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        runtime.serve_with_shutdown(std::future::pending()),
    )
    .await
    .expect("serve should fail fast");
    match result {
        Err(Error::StartupFailed(message)) => assert_eq!(message, "missing credentials"),
        other => panic!("expected StartupFailed, got {other:?}"),
    }
}

#[test]
fn unusable_addresses_fail_at_bind() {
    let mut config = common::config(Mode::Http);
    config.listener.listen_address = Some("unix:///tmp/func.sock".into());
    let result = Runtime::bind(FunctionHandle::from_instance(Lifecycle::default()), config);
    assert!(matches!(result, Err(Error::Bind(_))));

    let mut config = common::config(Mode::Http);
    config.listener.listen_address = Some("no-port-here".into());
    let result = Runtime::bind(FunctionHandle::from_instance(Lifecycle::default()), config);
    assert!(matches!(result, Err(Error::Address(_))));
}
