//! Liveness and readiness probes.
//!
//! # Data Flow
//! ```text
//! GET /health/liveness  ─┐
//! GET /health/readiness ─┴─▶ Probe::from_path
//!     → lifecycle::Adapter::check(probe) → Health
//!     → respond(): 200 when healthy, 500 otherwise, message as body
//! ```
//!
//! # Design Decisions
//! - Probes are answered above the user handler, so they keep working while
//!   the handler fails or expects events
//! - Paths are fixed, not configurable

use std::fmt;

use axum::http::StatusCode;

use crate::protocol::{ResponseSink, SendError};

pub const LIVENESS_PATH: &str = "/health/liveness";
pub const READINESS_PATH: &str = "/health/readiness";

/// Which probe a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Liveness,
    Readiness,
}

impl Probe {
    pub fn from_path(path: &str) -> Option<Probe> {
        match path {
            LIVENESS_PATH => Some(Probe::Liveness),
            READINESS_PATH => Some(Probe::Readiness),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Probe::Liveness => "liveness",
            Probe::Readiness => "readiness",
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a probe: a verdict and the body to answer with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub healthy: bool,
    pub message: String,
}

impl Health {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: "OK".to_string(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        if self.healthy {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A bare verdict carries the default message.
impl From<bool> for Health {
    fn from(healthy: bool) -> Self {
        Self {
            healthy,
            message: "OK".to_string(),
        }
    }
}

impl<S: Into<String>> From<(bool, S)> for Health {
    fn from((healthy, message): (bool, S)) -> Self {
        Self {
            healthy,
            message: message.into(),
        }
    }
}

/// Answer a probe request.
pub async fn respond(health: Health, send: &mut dyn ResponseSink) -> Result<(), SendError> {
    send.respond_text(health.status(), health.message).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::channel::outbound_pair;
    use crate::protocol::OutboundMessage;

    #[test]
    fn conversions() {
        assert_eq!(Health::from(true), Health::healthy());
        assert_eq!(Health::from(false).message, "OK");
        assert_eq!(Health::from((false, "dying")), Health::unhealthy("dying"));
        assert_eq!(Health::unhealthy("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn probe_paths() {
        assert_eq!(Probe::from_path("/health/liveness"), Some(Probe::Liveness));
        assert_eq!(Probe::from_path("/health/readiness"), Some(Probe::Readiness));
        assert_eq!(Probe::from_path("/health"), None);
    }

    #[tokio::test]
    async fn unhealthy_responds_500_with_message() {
        let (mut sink, mut rx) = outbound_pair();
        respond(Health::unhealthy("dying"), &mut sink).await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(OutboundMessage::ResponseStart { status: StatusCode::INTERNAL_SERVER_ERROR, .. })
        ));
        assert_eq!(
            rx.recv().await,
            Some(OutboundMessage::ResponseBody {
                body: "dying".into(),
                more_body: false
            })
        );
    }
}
