//! Request handling: axum request → Scope + streaming body source.
//!
//! # Responsibilities
//! - Classify the connection (plain HTTP or WebSocket upgrade)
//! - Carry method, path, query, headers, peer and request ID into the Scope
//! - Stream the body as `Request` messages, ending with `more_body == false`
//!
//! # Design Decisions
//! - Request ID is assigned by the tower-http layer before this runs
//! - The body is never buffered here; the dispatcher decides whether to collect it

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::body::{Body, BodyDataStream};
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, Request};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::protocol::{ConnectionKind, InboundMessage, MessageSource, Scope};

/// Request ID header name.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Split a request into the dispatcher's view of it.
pub fn into_dispatch(request: Request<Body>) -> (Scope, BodySource) {
    let (parts, body) = request.into_parts();

    let kind = if is_websocket_upgrade(&parts.headers) {
        ConnectionKind::Websocket
    } else {
        ConnectionKind::Http
    };
    let request_id = parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let mut scope = Scope::new(kind, parts.method, parts.uri.path())
        .with_query(parts.uri.query().map(str::to_string))
        .with_headers(parts.headers);
    if let Some(id) = request_id {
        scope = scope.with_request_id(id);
    }
    if let Some(peer) = peer {
        scope = scope.with_peer(peer);
    }

    (scope, BodySource::new(body))
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|p| p.trim().eq_ignore_ascii_case("websocket")))
}

/// [`MessageSource`] over a request body.
pub struct BodySource {
    stream: Option<BodyDataStream>,
}

impl BodySource {
    pub fn new(body: Body) -> Self {
        Self {
            stream: Some(body.into_data_stream()),
        }
    }
}

#[async_trait]
impl MessageSource for BodySource {
    async fn receive(&mut self) -> Option<InboundMessage> {
        let Some(stream) = self.stream.as_mut() else {
            return Some(InboundMessage::Disconnect);
        };
        match stream.next().await {
            Some(Ok(chunk)) => Some(InboundMessage::Request {
                body: chunk,
                more_body: true,
            }),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "request body aborted");
                self.stream = None;
                Some(InboundMessage::Disconnect)
            }
            None => {
                self.stream = None;
                Some(InboundMessage::Request {
                    body: Bytes::new(),
                    more_body: false,
                })
            }
        }
    }
}
