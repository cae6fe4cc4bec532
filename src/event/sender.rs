//! Event-aware response sink.

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};

use super::codec::{encode_binary, encode_structured};
use super::Event;
use crate::protocol::{Encoding, OutboundMessage, ResponseSink, SendError};

/// Wraps a plain sink and adds the `send_event` family.
///
/// Raw messages pass through untouched, so handlers in event mode can still
/// write arbitrary responses.
pub struct EventSender<'a> {
    inner: &'a mut dyn ResponseSink,
}

impl<'a> EventSender<'a> {
    pub fn new(inner: &'a mut dyn ResponseSink) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ResponseSink for EventSender<'_> {
    async fn send_raw(&mut self, message: OutboundMessage) -> Result<(), SendError> {
        self.inner.send_raw(message).await
    }

    fn supports_events(&self) -> bool {
        true
    }

    async fn send_encoded(
        &mut self,
        event: &Event,
        status: StatusCode,
        encoding: Encoding,
    ) -> Result<(), SendError> {
        let (mut headers, body) = match encoding {
            Encoding::Structured => encode_structured(event)?,
            Encoding::Binary => encode_binary(event)?,
        };
        headers.push((header::CONTENT_LENGTH, HeaderValue::from(body.len())));

        tracing::debug!(
            event_type = event.ty(),
            event_id = event.id(),
            ?encoding,
            %status,
            "sending event"
        );
        self.respond(status, headers, body).await
    }
}
