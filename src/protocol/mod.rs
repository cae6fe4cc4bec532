//! Connection protocol between the transport and the dispatcher.
//!
//! # Data Flow
//! ```text
//! transport ──Scope──────────────▶ Dispatcher::call
//! transport ──InboundMessage────▶ MessageSource::receive  (startup, body chunks)
//! Dispatcher ─OutboundMessage───▶ ResponseSink::send_raw   (acks, response parts)
//! ```
//!
//! # Design Decisions
//! - One call per lifespan connection or per HTTP request
//! - Messages within one call arrive in transport order
//! - The sink is a trait object so the dispatcher can hand the user handler
//!   either the raw sink or an event-encoding wrapper

pub mod channel;
pub mod scope;

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use thiserror::Error;

use crate::event::codec::EncodeError;
use crate::event::Event;

pub use channel::{channel_pair, ChannelSink, ChannelSource, ReplaySource};
pub use scope::{ConnectionKind, Scope};

/// Messages flowing from the transport into a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Lifespan: the server is starting.
    Startup,
    /// Lifespan: the server is shutting down.
    Shutdown,
    /// HTTP: one body chunk. `more_body == false` marks the final chunk.
    Request { body: Bytes, more_body: bool },
    /// HTTP: the client is gone or the body has been fully delivered.
    Disconnect,
}

/// Messages flowing from a dispatch call back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    StartupComplete,
    StartupFailed { message: String },
    ShutdownComplete,
    /// Status line and headers. Header order is preserved as sent.
    ResponseStart {
        status: StatusCode,
        headers: Vec<(HeaderName, HeaderValue)>,
    },
    ResponseBody { body: Bytes, more_body: bool },
}

/// Wire representation used when sending an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Attributes and payload in one JSON body.
    Structured,
    /// Attributes as `ce-*` headers, payload as the raw body.
    Binary,
}

/// Errors raised while sending a response.
#[derive(Debug, Error)]
pub enum SendError {
    /// The transport side of the call has gone away.
    #[error("response channel closed")]
    Closed,

    /// An event-only operation was used on a plain sink.
    #[error("this response sink cannot send events")]
    EventsUnsupported,

    /// The event could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Source of inbound messages for one dispatch call.
#[async_trait]
pub trait MessageSource: Send {
    /// Next inbound message, or `None` once the transport has nothing more.
    async fn receive(&mut self) -> Option<InboundMessage>;
}

/// Destination for outbound messages of one dispatch call.
///
/// Plain sinks only implement [`send_raw`](ResponseSink::send_raw). Sinks
/// that can encode events override [`supports_events`](ResponseSink::supports_events)
/// and [`send_encoded`](ResponseSink::send_encoded).
#[async_trait]
pub trait ResponseSink: Send {
    /// Transmit a low-level message verbatim.
    async fn send_raw(&mut self, message: OutboundMessage) -> Result<(), SendError>;

    /// Whether the `send_event` family is available on this sink.
    fn supports_events(&self) -> bool {
        false
    }

    /// Encode `event` with `encoding` and transmit it with `status`.
    async fn send_encoded(
        &mut self,
        _event: &Event,
        _status: StatusCode,
        _encoding: Encoding,
    ) -> Result<(), SendError> {
        Err(SendError::EventsUnsupported)
    }

    /// Send `event` with the default (structured) encoding.
    async fn send_event(&mut self, event: &Event, status: StatusCode) -> Result<(), SendError> {
        self.send_encoded(event, status, Encoding::Structured).await
    }

    async fn send_structured(&mut self, event: &Event, status: StatusCode) -> Result<(), SendError> {
        self.send_encoded(event, status, Encoding::Structured).await
    }

    async fn send_binary(&mut self, event: &Event, status: StatusCode) -> Result<(), SendError> {
        self.send_encoded(event, status, Encoding::Binary).await
    }

    /// Send a complete response in one go: start, then a single final body.
    async fn respond(
        &mut self,
        status: StatusCode,
        headers: Vec<(HeaderName, HeaderValue)>,
        body: Bytes,
    ) -> Result<(), SendError> {
        self.send_raw(OutboundMessage::ResponseStart { status, headers })
            .await?;
        self.send_raw(OutboundMessage::ResponseBody {
            body,
            more_body: false,
        })
        .await
    }

    /// Send a complete `text/plain` response.
    async fn respond_text(&mut self, status: StatusCode, body: String) -> Result<(), SendError> {
        let headers = vec![(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )];
        self.respond(status, headers, Bytes::from(body)).await
    }
}

/// Read body chunks until the final one, concatenating them in arrival order.
///
/// A `Disconnect` or exhausted source ends the body early.
pub async fn receive_body(source: &mut dyn MessageSource) -> Bytes {
    let mut body = Vec::new();
    loop {
        match source.receive().await {
            Some(InboundMessage::Request { body: chunk, more_body }) => {
                body.extend_from_slice(&chunk);
                if !more_body {
                    break;
                }
            }
            Some(InboundMessage::Disconnect) | None => break,
            Some(other) => {
                tracing::debug!(message = ?other, "ignoring non-body message while reading body");
            }
        }
    }
    Bytes::from(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_body_concatenates_chunks() {
        let (tx, mut source) = channel::inbound_pair();
        for (chunk, more_body) in [("ab", true), ("", true), ("cd", false)] {
            tx.send(InboundMessage::Request {
                body: Bytes::from(chunk),
                more_body,
            })
            .unwrap();
        }
        assert_eq!(receive_body(&mut source).await, Bytes::from("abcd"));
    }

    #[tokio::test]
    async fn receive_body_handles_empty_body() {
        let (tx, mut source) = channel::inbound_pair();
        tx.send(InboundMessage::Request {
            body: Bytes::new(),
            more_body: false,
        })
        .unwrap();
        assert!(receive_body(&mut source).await.is_empty());
    }

    #[tokio::test]
    async fn receive_body_stops_on_disconnect() {
        let (tx, mut source) = channel::inbound_pair();
        tx.send(InboundMessage::Request {
            body: Bytes::from("partial"),
            more_body: true,
        })
        .unwrap();
        tx.send(InboundMessage::Disconnect).unwrap();
        assert_eq!(receive_body(&mut source).await, Bytes::from("partial"));
    }
}
