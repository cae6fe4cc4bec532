//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use func_runtime::{FunctionHandle, Mode, Runtime, RuntimeConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A runtime serving on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<func_runtime::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait (bounded) for `serve` to return.
    pub async fn shutdown(self) -> func_runtime::Result<()> {
        let _ = self.stop.send(());
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("serve did not return after shutdown")
            .expect("serve task panicked")
    }
}

pub fn config(mode: Mode) -> RuntimeConfig {
    let mut config = RuntimeConfig::for_mode(mode);
    config.listener.listen_address = Some("127.0.0.1:0".to_string());
    config.timeouts.drain_secs = 5;
    config.timeouts.startup_secs = 5;
    config
}

/// Bind, serve in the background, and wait until the liveness probe answers.
pub async fn spawn(function: FunctionHandle, mode: Mode) -> TestServer {
    let runtime = Runtime::bind(function, config(mode)).expect("bind");
    let addr = runtime.local_addrs()[0];
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(runtime.serve_with_shutdown(async move {
        let _ = stopped.await;
    }));

    wait_until_serving(addr).await;
    TestServer { addr, stop, task }
}

/// Poll the liveness probe at `addr` until the runtime answers it.
pub async fn wait_until_serving(addr: SocketAddr) {
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/health/liveness");
    for _ in 0..100 {
        if let Ok(response) = client.get(&url).send().await {
            if response.status().is_success() || response.status().is_server_error() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {addr} never started serving");
}
