//! The per-connection state machine.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};

use axum::http::StatusCode;
use futures_util::FutureExt;
use tracing::Instrument;

use crate::config::Mode;
use crate::event::{codec, Event, EventError, EventSender};
use crate::function::{self, panic_message, FunctionError, FunctionHandle};
use crate::health::{self, Probe};
use crate::lifecycle::Adapter;
use crate::observability::metrics;
use crate::protocol::{
    receive_body, ConnectionKind, InboundMessage, MessageSource, OutboundMessage, ReplaySource,
    ResponseSink, Scope,
};

/// Body of the 400 answer to a request that is not a valid event.
pub const NOT_AN_EVENT_BODY: &str = "Bad Request: This endpoint expects CloudEvent requests. ";

pub const ERROR_EVENT_TYPE: &str = "dev.functions.error";
pub const ERROR_EVENT_SOURCE: &str = "/cloudevent/error";

/// `StartupFailed` message when a shutdown overtakes a running start hook.
pub const STOPPED_DURING_STARTUP: &str = "function was stopped before startup completed";

/// Lifecycle state shared by every connection of one dispatcher.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    LifespanWait = 0,
    Started = 1,
    Stopped = 2,
}

impl From<u8> for State {
    fn from(val: u8) -> Self {
        match val {
            1 => State::Started,
            2 => State::Stopped,
            _ => State::LifespanWait,
        }
    }
}

/// Routes lifespan connections and requests for one function.
///
/// Shared by all connections; holds no locks. The state only moves forward:
/// `LifespanWait → Started → Stopped`, or straight to `Stopped`.
pub struct Dispatcher {
    mode: Mode,
    adapter: Adapter,
    state: AtomicU8,
    span: tracing::Span,
}

impl Dispatcher {
    pub fn new(function: FunctionHandle, mode: Mode) -> Self {
        Self {
            mode,
            adapter: Adapter::new(function),
            state: AtomicU8::new(State::LifespanWait as u8),
            span: tracing::info_span!("dispatcher", mode = mode.as_str()),
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> State {
        State::from(self.state.load(Ordering::Acquire))
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Handle one lifespan connection or one request. Returns once the
    /// connection is finished with.
    pub async fn call(
        &self,
        scope: Scope,
        receive: &mut dyn MessageSource,
        send: &mut dyn ResponseSink,
    ) {
        let span = tracing::debug_span!(
            parent: &self.span,
            "call",
            kind = %scope.kind(),
            method = %scope.method(),
            path = %scope.path(),
            request_id = scope.request_id().unwrap_or("-"),
        );
        match scope.kind() {
            ConnectionKind::Lifespan => self.lifespan(receive, send).instrument(span).await,
            _ => self.request(scope, receive, send).instrument(span).await,
        }
    }

    async fn lifespan(&self, receive: &mut dyn MessageSource, send: &mut dyn ResponseSink) {
        loop {
            match receive.receive().await {
                Some(InboundMessage::Startup) => {
                    if self.state() != State::LifespanWait {
                        tracing::debug!(state = ?self.state(), "duplicate startup ignored");
                        if self.state() == State::Started {
                            reply(send, OutboundMessage::StartupComplete).await;
                        }
                        continue;
                    }
                    match self.adapter.on_start(&function::environment()).await {
                        Ok(()) => {
                            let promoted = self.state.compare_exchange(
                                State::LifespanWait as u8,
                                State::Started as u8,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            );
                            if let Err(current) = promoted {
                                tracing::warn!(
                                    state = ?State::from(current),
                                    "start hook finished after shutdown, not reporting startup"
                                );
                                let message = STOPPED_DURING_STARTUP.to_string();
                                reply(send, OutboundMessage::StartupFailed { message }).await;
                                return;
                            }
                            tracing::info!("function started");
                            reply(send, OutboundMessage::StartupComplete).await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "function failed to start");
                            let message = e.to_string();
                            reply(send, OutboundMessage::StartupFailed { message }).await;
                            return;
                        }
                    }
                }
                Some(InboundMessage::Shutdown) => {
                    let previous = State::from(self.state.swap(State::Stopped as u8, Ordering::AcqRel));
                    if previous == State::Stopped {
                        tracing::debug!("already stopped, stop hook not run again");
                    } else if let Err(e) = self.adapter.on_stop().await {
                        tracing::error!(error = %e, "function stop hook failed");
                    } else {
                        tracing::info!("function stopped");
                    }
                    reply(send, OutboundMessage::ShutdownComplete).await;
                    return;
                }
                Some(other) => {
                    tracing::debug!(message = ?other, "ignoring non-lifespan message");
                }
                None => return,
            }
        }
    }

    async fn request(
        &self,
        mut scope: Scope,
        receive: &mut dyn MessageSource,
        send: &mut dyn ResponseSink,
    ) {
        if self.state() != State::Started {
            metrics::record_dispatch("not_started");
            let body = match self.state() {
                State::Stopped => "Service Unavailable: function has stopped",
                _ => "Service Unavailable: function has not started",
            };
            respond(send, StatusCode::SERVICE_UNAVAILABLE, body.to_string()).await;
            return;
        }

        if *scope.kind() != ConnectionKind::Http {
            metrics::record_dispatch("unsupported_kind");
            tracing::warn!(kind = %scope.kind(), "rejecting non-HTTP connection");
            let body = format!(
                "Functions currently only support HTTP connections. Got {}",
                scope.kind()
            );
            respond(send, StatusCode::BAD_REQUEST, body).await;
            return;
        }

        if let Some(probe) = Probe::from_path(scope.path()) {
            metrics::record_dispatch(probe.as_str());
            let verdict = self.adapter.check(probe);
            if let Err(e) = health::respond(verdict, send).await {
                tracing::warn!(error = %e, probe = %probe, "failed to answer probe");
            }
            return;
        }

        match self.mode {
            Mode::Http => self.invoke(&scope, receive, send).await,
            Mode::Event => {
                let body = receive_body(receive).await;
                match codec::decode(scope.headers(), &body) {
                    Ok(event) => {
                        tracing::debug!(event_type = event.ty(), event_id = event.id(), "event decoded");
                        scope.attach_event(event);
                        let mut replay = ReplaySource::new(body, receive);
                        let mut sender = EventSender::new(send);
                        self.invoke(&scope, &mut replay, &mut sender).await;
                    }
                    Err(e) => {
                        metrics::record_dispatch("rejected_event");
                        tracing::warn!(
                            method = %scope.method(),
                            path = %scope.path(),
                            error = %e,
                            "rejecting request that is not an event"
                        );
                        tracing::debug!(headers = ?scope.headers(), "rejected request headers");
                        respond(send, StatusCode::BAD_REQUEST, NOT_AN_EVENT_BODY.to_string()).await;
                    }
                }
            }
        }
    }

    async fn invoke(&self, scope: &Scope, receive: &mut dyn MessageSource, send: &mut dyn ResponseSink) {
        let handled = AssertUnwindSafe(self.adapter.function().function().handle(scope, receive, send))
            .catch_unwind()
            .await;
        let error: FunctionError = match handled {
            Ok(Ok(())) => {
                metrics::record_dispatch("handled");
                return;
            }
            Ok(Err(e)) => e,
            Err(payload) => format!("handler panicked: {}", panic_message(&*payload)).into(),
        };

        metrics::record_dispatch("handler_error");
        tracing::error!(error = %error, "function failed");

        if send.supports_events() {
            match error_event(&error) {
                Ok(event) => match send.send_event(&event, StatusCode::INTERNAL_SERVER_ERROR).await {
                    Ok(()) => return,
                    Err(e) => tracing::warn!(error = %e, "failed to send error event"),
                },
                Err(e) => tracing::warn!(error = %e, "failed to build error event"),
            }
        }
        respond(
            send,
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal Server Error: {error}"),
        )
        .await;
    }
}

fn error_event(error: &FunctionError) -> Result<Event, EventError> {
    Event::builder(ERROR_EVENT_TYPE, ERROR_EVENT_SOURCE)
        .data(serde_json::json!({ "message": format!("Error: {error}") }))
        .build()
}

async fn reply(send: &mut dyn ResponseSink, message: OutboundMessage) {
    if let Err(e) = send.send_raw(message).await {
        tracing::warn!(error = %e, "lifespan reply not delivered");
    }
}

async fn respond(send: &mut dyn ResponseSink, status: StatusCode, body: String) {
    if let Err(e) = send.respond_text(status, body).await {
        tracing::warn!(error = %e, %status, "response not delivered");
    }
}
