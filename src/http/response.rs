//! Response assembly: outbound messages → axum response.
//!
//! # Design Decisions
//! - The whole response is buffered; the transport answers once the
//!   dispatcher returns
//! - A second `ResponseStart` replaces whatever was started before, so an
//!   error response can follow a partially written one
//! - No response at all becomes a 500

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::BytesMut;

use crate::protocol::{OutboundMessage, ResponseSink, SendError};

pub const NO_RESPONSE_BODY: &str = "function returned without sending a response";

/// [`ResponseSink`] collecting one HTTP response.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BytesMut,
    complete: bool,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseSink for ResponseBuffer {
    async fn send_raw(&mut self, message: OutboundMessage) -> Result<(), SendError> {
        match message {
            OutboundMessage::ResponseStart { status, headers } => {
                if self.status.is_some() {
                    tracing::debug!(%status, "response restarted, discarding earlier part");
                }
                self.status = Some(status);
                self.headers = headers;
                self.body.clear();
                self.complete = false;
            }
            OutboundMessage::ResponseBody { body, more_body } => {
                if self.status.is_none() {
                    tracing::warn!("response body sent before response start, ignored");
                } else if self.complete {
                    tracing::warn!("response body sent after the final chunk, ignored");
                } else {
                    self.body.extend_from_slice(&body);
                    self.complete = !more_body;
                }
            }
            other => {
                tracing::debug!(message = ?other, "ignoring lifespan message on a request");
            }
        }
        Ok(())
    }
}

impl IntoResponse for ResponseBuffer {
    fn into_response(self) -> Response {
        let Some(status) = self.status else {
            tracing::error!("{NO_RESPONSE_BODY}");
            return (StatusCode::INTERNAL_SERVER_ERROR, NO_RESPONSE_BODY).into_response();
        };

        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            // The body is complete, so the server computes the length itself.
            if name == header::CONTENT_LENGTH {
                continue;
            }
            headers.append(name, value);
        }
        response
    }
}
