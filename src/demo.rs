//! Example functions served by the binary.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};

use func_runtime::{
    BoxFuture, Event, Function, FunctionError, Health, MessageSource, ResponseSink, Scope,
};

/// Static handler: a bare function wrapped by the runtime.
pub fn handle<'a>(
    scope: &'a Scope,
    _receive: &'a mut dyn MessageSource,
    send: &'a mut dyn ResponseSink,
) -> BoxFuture<'a, Result<(), FunctionError>> {
    Box::pin(async move {
        let Some(event) = scope.event() else {
            tracing::info!("OK: static");
            send.respond_text(StatusCode::OK, "OK: static".into()).await?;
            return Ok(());
        };

        tracing::info!(event_type = event.ty(), source = event.source(), "static event handler invoked");
        let reply = Event::builder("com.example.response.static", "/fcloudevent/static")
            .data(json!({
                "message": "OK: static CloudEvent handler",
                "received_event_type": event.ty(),
                "received_event_source": event.source(),
                "received_data": event.data_json().unwrap_or(Value::Null),
            }))
            .build()?;
        send.send_event(&reply, StatusCode::OK).await?;
        Ok(())
    })
}

/// Instanced function: counts events and reports it through its probes.
pub struct Counter {
    events: AtomicU64,
}

impl Counter {
    /// Factory handed to `FunctionHandle::from_factory`.
    pub fn new() -> Self {
        tracing::info!("function instance created");
        Self {
            events: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Function for Counter {
    async fn handle(
        &self,
        scope: &Scope,
        _receive: &mut dyn MessageSource,
        send: &mut dyn ResponseSink,
    ) -> Result<(), FunctionError> {
        let Some(event) = scope.event() else {
            tracing::info!("OK: instanced");
            send.respond_text(StatusCode::OK, "OK: instanced".into()).await?;
            return Ok(());
        };

        let count = self.events.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(count, event_type = event.ty(), source = event.source(), "event received");

        let reply = Event::builder("com.example.response.instanced", "/fcloudevent/instanced")
            .data(json!({
                "message": "OK: instanced CloudEvent handler",
                "event_count": count,
                "received_event_type": event.ty(),
                "received_event_source": event.source(),
                "received_data": event.data_json().unwrap_or(Value::Null),
            }))
            .build()?;

        if count % 2 == 0 {
            send.send_structured(&reply, StatusCode::OK).await?;
        } else {
            send.send_binary(&reply, StatusCode::OK).await?;
        }
        Ok(())
    }

    fn stop(&self) -> Option<BoxFuture<'_, Result<(), FunctionError>>> {
        Some(Box::pin(async move {
            tracing::info!(events = self.events.load(Ordering::Relaxed), "stopping");
            Ok(())
        }))
    }

    fn alive(&self) -> Option<Health> {
        let events = self.events.load(Ordering::Relaxed);
        Some((true, format!("I'm alive! Events: {events}")).into())
    }

    fn ready(&self) -> Option<Health> {
        Some((true, "I'm ready!").into())
    }
}
