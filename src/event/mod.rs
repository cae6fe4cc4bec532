//! Event envelope subsystem.
//!
//! # Data Flow
//! ```text
//! request headers + body
//!     → codec.rs decode (binary: ce-* headers, structured: JSON body)
//!     → Event attached to the Scope
//!     → user handler
//!     → sender.rs EventSender (structured or binary encode + content-length)
//!     → response headers + body
//! ```
//!
//! # Design Decisions
//! - An `Event` without `type` and `source` cannot be built; decoding
//!   fails instead of producing a partial event
//! - Missing ids are generated (UUID v4), matching what producers expect
//! - Payload is either JSON or opaque bytes; nothing in between

pub mod codec;
pub mod sender;

use std::collections::BTreeMap;

use bytes::Bytes;
use thiserror::Error;

pub use sender::EventSender;

/// Spec version written on every event built here.
pub const SPEC_VERSION: &str = "1.0";

/// Spec versions accepted when decoding.
pub const SUPPORTED_SPEC_VERSIONS: [&str; 2] = ["1.0", "0.3"];

/// Why an event could not be built or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A required attribute is absent.
    #[error("missing required fields: {0}")]
    MissingRequiredFields(String),

    /// A required attribute is present but unusable.
    #[error("invalid required fields: {0}")]
    InvalidRequiredFields(String),
}

/// Event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Json(serde_json::Value),
    Binary(Bytes),
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        Data::Json(value)
    }
}

impl From<Bytes> for Data {
    fn from(bytes: Bytes) -> Self {
        Data::Binary(bytes)
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data::Binary(Bytes::from(bytes))
    }
}

/// A CloudEvents envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    spec_version: String,
    id: String,
    source: String,
    ty: String,
    data_content_type: Option<String>,
    data_schema: Option<String>,
    subject: Option<String>,
    time: Option<String>,
    extensions: BTreeMap<String, String>,
    data: Option<Data>,
}

impl Event {
    /// Start building an event with its two required attributes.
    pub fn builder(ty: impl Into<String>, source: impl Into<String>) -> EventBuilder {
        EventBuilder {
            spec_version: SPEC_VERSION.to_string(),
            id: None,
            source: source.into(),
            ty: ty.into(),
            data_content_type: None,
            data_schema: None,
            subject: None,
            time: None,
            extensions: BTreeMap::new(),
            data: None,
        }
    }

    pub fn spec_version(&self) -> &str {
        &self.spec_version
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The `type` attribute.
    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn data_content_type(&self) -> Option<&str> {
        self.data_content_type.as_deref()
    }

    pub fn data_schema(&self) -> Option<&str> {
        self.data_schema.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn extension(&self, name: &str) -> Option<&str> {
        self.extensions.get(name).map(String::as_str)
    }

    pub fn extensions(&self) -> &BTreeMap<String, String> {
        &self.extensions
    }

    pub fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    /// Payload as JSON, parsing binary payloads when they hold JSON.
    pub fn data_json(&self) -> Option<serde_json::Value> {
        match self.data.as_ref()? {
            Data::Json(value) => Some(value.clone()),
            Data::Binary(bytes) => serde_json::from_slice(bytes).ok(),
        }
    }
}

/// Builder for [`Event`]; see [`Event::builder`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    spec_version: String,
    id: Option<String>,
    source: String,
    ty: String,
    data_content_type: Option<String>,
    data_schema: Option<String>,
    subject: Option<String>,
    time: Option<String>,
    extensions: BTreeMap<String, String>,
    data: Option<Data>,
}

impl EventBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn spec_version(mut self, version: impl Into<String>) -> Self {
        self.spec_version = version.into();
        self
    }

    pub fn data_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.data_content_type = Some(content_type.into());
        self
    }

    pub fn data_schema(mut self, schema: impl Into<String>) -> Self {
        self.data_schema = Some(schema.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: impl Into<Data>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn build(self) -> Result<Event, EventError> {
        if self.ty.is_empty() {
            return Err(EventError::InvalidRequiredFields("type must not be empty".into()));
        }
        if self.source.is_empty() {
            return Err(EventError::InvalidRequiredFields("source must not be empty".into()));
        }
        if !SUPPORTED_SPEC_VERSIONS.contains(&self.spec_version.as_str()) {
            return Err(EventError::InvalidRequiredFields(format!(
                "unsupported specversion `{}`",
                self.spec_version
            )));
        }

        Ok(Event {
            spec_version: self.spec_version,
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            source: self.source,
            ty: self.ty,
            data_content_type: self.data_content_type,
            data_schema: self.data_schema,
            subject: self.subject,
            time: self.time,
            extensions: self.extensions,
            data: self.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_fills_id_and_spec_version() {
        let event = Event::builder("dev.test.ping", "/test").build().unwrap();
        assert_eq!(event.spec_version(), "1.0");
        assert!(uuid::Uuid::parse_str(event.id()).is_ok());
    }

    #[test]
    fn empty_required_attributes_are_rejected() {
        assert!(matches!(
            Event::builder("", "/test").build(),
            Err(EventError::InvalidRequiredFields(_))
        ));
        assert!(matches!(
            Event::builder("dev.test", "").build(),
            Err(EventError::InvalidRequiredFields(_))
        ));
    }

    #[test]
    fn data_json_parses_binary_json() {
        let event = Event::builder("t", "/s")
            .data(br#"{"n":1}"#.to_vec())
            .build()
            .unwrap();
        assert_eq!(event.data_json(), Some(json!({"n": 1})));
    }
}
