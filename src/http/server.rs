//! HTTP server setup and the transport loop.
//!
//! # Responsibilities
//! - Create the Axum Router with one catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Drive the lifespan connection around serving
//! - Serve every bound socket until shutdown, then drain

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::RuntimeConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::function::FunctionHandle;
use crate::http::request::into_dispatch;
use crate::http::response::ResponseBuffer;
use crate::lifecycle::Shutdown;
use crate::net::connection::InFlight;
use crate::net::BoundSocket;
use crate::observability::metrics;
use crate::protocol::channel::{channel_pair, TransportEnd};
use crate::protocol::{InboundMessage, OutboundMessage, Scope};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub in_flight: InFlight,
}

/// HTTP transport for one function.
pub struct HttpServer {
    dispatcher: Arc<Dispatcher>,
    config: RuntimeConfig,
    in_flight: InFlight,
    shutdown: Shutdown,
    span: tracing::Span,
}

impl HttpServer {
    pub fn new(function: FunctionHandle, config: RuntimeConfig) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(function, config.mode)),
            config,
            in_flight: InFlight::new(),
            shutdown: Shutdown::new(),
            span: tracing::info_span!("http_server"),
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(&self) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher.clone(),
            in_flight: self.in_flight.clone(),
        };
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Start the function, serve `sockets` until `signal` resolves, drain,
    /// then stop the function.
    pub async fn run<F>(self, sockets: Vec<BoundSocket>, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = self.span.clone();
        self.run_inner(sockets, signal).instrument(span).await
    }

    async fn run_inner<F>(self, sockets: Vec<BoundSocket>, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut lifespan = Lifespan::spawn(self.dispatcher.clone());
        if let Err(e) = lifespan.startup(self.startup_timeout()).await {
            lifespan.abort();
            return Err(e);
        }

        let listeners = match self.listen(sockets) {
            Ok(listeners) => listeners,
            Err(e) => {
                lifespan.shutdown(self.drain_timeout()).await;
                return Err(e);
            }
        };

        let app = self.build_router();
        let mut servers = JoinSet::new();
        for listener in listeners {
            let app = app.clone();
            let stop = self.shutdown.notified();
            servers.spawn(
                async move {
                    let addr = listener.local_addr()?;
                    tracing::info!(address = %addr, "HTTP server listening");
                    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                        .with_graceful_shutdown(stop)
                        .await?;
                    tracing::info!(address = %addr, "HTTP server stopped");
                    Ok::<_, std::io::Error>(())
                }
                .in_current_span(),
            );
        }

        tokio::select! {
            _ = signal => tracing::info!("shutdown requested"),
            Some(result) = servers.join_next() => {
                tracing::error!(result = ?result, "listener stopped unexpectedly, shutting down");
            }
        }
        self.shutdown.trigger();

        let drained = tokio::time::timeout(self.drain_timeout(), async {
            while let Some(result) = servers.join_next().await {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "listener failed"),
                    Err(e) => tracing::error!(error = %e, "listener task failed"),
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                in_flight = self.in_flight.count(),
                "drain deadline passed, abandoning in-flight requests"
            );
            servers.abort_all();
        }

        lifespan.shutdown(self.drain_timeout()).await;
        Ok(())
    }

    fn listen(&self, sockets: Vec<BoundSocket>) -> Result<Vec<TcpListener>> {
        sockets
            .into_iter()
            .map(|socket| {
                let descriptor = socket.descriptor();
                socket.into_listener(self.config.listener.backlog).map_err(|e| {
                    tracing::error!(socket = %descriptor, error = %e, "failed to listen");
                    Error::Io(e)
                })
            })
            .collect()
    }

    fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.startup_secs)
    }

    fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.drain_secs)
    }
}

/// Transport side of the lifespan connection.
struct Lifespan {
    inbound: mpsc::UnboundedSender<InboundMessage>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    task: JoinHandle<()>,
}

impl Lifespan {
    fn spawn(dispatcher: Arc<Dispatcher>) -> Self {
        let (TransportEnd { inbound, outbound }, mut source, mut sink) = channel_pair();
        let task = tokio::spawn(
            async move {
                dispatcher.call(Scope::lifespan(), &mut source, &mut sink).await;
            }
            .in_current_span(),
        );
        Self {
            inbound,
            outbound,
            task,
        }
    }

    async fn startup(&mut self, limit: Duration) -> Result<()> {
        self.inbound
            .send(InboundMessage::Startup)
            .map_err(|_| Error::Lifespan("lifespan connection closed before startup".into()))?;

        match tokio::time::timeout(limit, self.outbound.recv()).await {
            Ok(Some(OutboundMessage::StartupComplete)) => {
                tracing::info!("function startup complete");
                Ok(())
            }
            Ok(Some(OutboundMessage::StartupFailed { message })) => Err(Error::StartupFailed(message)),
            Ok(Some(other)) => Err(Error::Lifespan(format!(
                "unexpected reply to startup: {other:?}"
            ))),
            Ok(None) => Err(Error::Lifespan(
                "lifespan connection closed during startup".into(),
            )),
            Err(_) => Err(Error::StartupFailed(format!(
                "start hook did not finish within {}s",
                limit.as_secs()
            ))),
        }
    }

    async fn shutdown(mut self, limit: Duration) {
        if self.inbound.send(InboundMessage::Shutdown).is_err() {
            tracing::debug!("lifespan connection already finished");
        }
        match tokio::time::timeout(limit, self.outbound.recv()).await {
            Ok(Some(OutboundMessage::ShutdownComplete)) => {
                tracing::info!("function shutdown complete");
            }
            Ok(reply) => tracing::warn!(reply = ?reply, "unexpected lifespan reply to shutdown"),
            Err(_) => {
                tracing::warn!("stop hook did not finish within {}s", limit.as_secs());
                self.task.abort();
            }
        }
        drop(self.inbound);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "lifespan task failed");
            }
        }
    }

    fn abort(self) {
        self.task.abort();
    }
}

/// Catch-all handler: every request goes through the dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let guard = state.in_flight.track();

    let (scope, mut source) = into_dispatch(request);
    tracing::debug!(dispatch = %guard.id(), path = %scope.path(), "dispatching request");
    let mut buffer = ResponseBuffer::new();
    state.dispatcher.call(scope, &mut source, &mut buffer).await;

    let response = buffer.into_response();
    metrics::record_request(&method, response.status(), started.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::function::{BoxFuture, FunctionError};
    use crate::protocol::{MessageSource, ResponseSink};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn hello<'a>(
        scope: &'a Scope,
        _receive: &'a mut dyn MessageSource,
        send: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, Result<(), FunctionError>> {
        Box::pin(async move {
            let body = format!("hello {}", scope.request_id().unwrap_or("anonymous"));
            send.respond_text(StatusCode::OK, body).await?;
            Ok(())
        })
    }

    #[tokio::test]
    async fn router_assigns_and_propagates_request_id() {
        let server = HttpServer::new(
            FunctionHandle::from_handler(hello),
            RuntimeConfig::for_mode(Mode::Http),
        );
        let mut lifespan = Lifespan::spawn(server.dispatcher().clone());
        lifespan.startup(Duration::from_secs(5)).await.unwrap();

        let response = server
            .build_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, format!("hello {id}"));

        lifespan.shutdown(Duration::from_secs(5)).await;
        assert!(server.dispatcher().adapter().is_stopped());
    }
}
