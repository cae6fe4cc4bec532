//! Startup orchestration.
//!
//! # Responsibilities
//! - Plan listen addresses and bind sockets (fatal on failure)
//! - Install the metrics endpoint when configured
//! - Hand the sockets to the HTTP transport and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: binding happens in `Runtime::bind`, before any serving
//! - Bound addresses are known before serving, so callers can bind port 0

use std::future::Future;
use std::net::SocketAddr;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::function::FunctionHandle;
use crate::http::HttpServer;
use crate::lifecycle::signals::shutdown_signal;
use crate::net::{self, BoundSocket, Binder};
use crate::observability::metrics;

/// A function bound to its sockets, ready to serve.
pub struct Runtime {
    server: HttpServer,
    sockets: Vec<BoundSocket>,
}

impl Runtime {
    /// Plan and bind the configured listen addresses.
    pub fn bind(function: FunctionHandle, config: RuntimeConfig) -> Result<Self> {
        let raw = config.listen_address().to_string();
        let specs = net::plan(&raw)?;
        let sockets = Binder::new().bind(&specs)?;
        tracing::info!(
            mode = config.mode.as_str(),
            listen_address = %raw,
            sockets = sockets.len(),
            "runtime configured"
        );

        Ok(Self {
            server: HttpServer::new(function, config),
            sockets,
        })
    }

    /// Addresses actually bound, in bind order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.sockets.iter().map(BoundSocket::local_addr).collect()
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(address) = &self.server.config().observability.metrics_address {
            match address.parse() {
                Ok(addr) => {
                    if let Err(e) = metrics::init_metrics(addr) {
                        tracing::error!(address = %address, error = %e, "failed to install metrics endpoint");
                    }
                }
                Err(e) => {
                    tracing::error!(address = %address, error = %e, "failed to parse metrics address");
                }
            }
        }

        self.server.run(self.sockets, signal).await?;
        tracing::info!("shutdown complete");
        Ok(())
    }
}

/// Bind and serve `function` until SIGINT/SIGTERM.
pub async fn serve(function: FunctionHandle, config: RuntimeConfig) -> Result<()> {
    Runtime::bind(function, config)?.serve().await
}
