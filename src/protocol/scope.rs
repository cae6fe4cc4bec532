//! Per-connection context.

use std::fmt;
use std::net::SocketAddr;

use axum::http::{HeaderMap, Method};

use crate::event::Event;

/// What kind of connection a [`Scope`] describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Startup/shutdown signaling, independent of requests.
    Lifespan,
    /// A plain HTTP request.
    Http,
    /// An HTTP request asking for a WebSocket upgrade.
    Websocket,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Lifespan => "lifespan",
            ConnectionKind::Http => "http",
            ConnectionKind::Websocket => "websocket",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context of one lifespan connection or one HTTP request.
///
/// Read-only to handlers. In event mode the dispatcher attaches the decoded
/// [`Event`] exactly once before the handler runs.
#[derive(Debug, Clone)]
pub struct Scope {
    kind: ConnectionKind,
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    peer: Option<SocketAddr>,
    request_id: Option<String>,
    event: Option<Event>,
}

impl Scope {
    /// Scope of the lifespan connection.
    pub fn lifespan() -> Self {
        Self::new(ConnectionKind::Lifespan, Method::GET, "")
    }

    /// Scope of an HTTP request.
    pub fn http(method: Method, path: impl Into<String>) -> Self {
        Self::new(ConnectionKind::Http, method, path)
    }

    pub fn new(kind: ConnectionKind, method: Method, path: impl Into<String>) -> Self {
        Self {
            kind,
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            peer: None,
            request_id: None,
            event: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn kind(&self) -> &ConnectionKind {
        &self.kind
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The decoded event, present only in event mode.
    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    pub(crate) fn attach_event(&mut self, event: Event) {
        debug_assert!(self.event.is_none(), "event attached twice");
        self.event = Some(event);
    }
}
