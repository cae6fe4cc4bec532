//! HTTP bindings for [`Event`]: structured and binary content modes.
//!
//! Binary mode is selected on decode whenever a `ce-specversion` header is
//! present; every other request is read as a structured JSON envelope.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{Data, Event, EventBuilder, EventError};

/// Content type of a structured-mode body.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

const CE_PREFIX: &str = "ce-";

/// Encoded headers plus body, headers in emission order.
pub type Encoded = (Vec<(HeaderName, HeaderValue)>, Bytes);

/// Errors raised while encoding an event.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// An attribute value or name cannot be carried in an HTTP header.
    #[error("attribute `{name}` cannot be carried in an HTTP header")]
    InvalidHeader { name: String },

    #[error("failed to serialize event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode an event from request headers and the complete body.
pub fn decode(headers: &HeaderMap, body: &[u8]) -> Result<Event, EventError> {
    if headers.contains_key("ce-specversion") {
        decode_binary(headers, body)
    } else {
        decode_structured(body)
    }
}

/// Encode as one JSON envelope.
pub fn encode_structured(event: &Event) -> Result<Encoded, EncodeError> {
    let mut envelope = Map::new();
    envelope.insert("specversion".into(), event.spec_version().into());
    envelope.insert("id".into(), event.id().into());
    envelope.insert("source".into(), event.source().into());
    envelope.insert("type".into(), event.ty().into());

    let optional = [
        ("datacontenttype", event.data_content_type()),
        ("dataschema", event.data_schema()),
        ("subject", event.subject()),
        ("time", event.time()),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            envelope.insert(name.into(), value.into());
        }
    }
    for (name, value) in event.extensions() {
        envelope.insert(name.clone(), value.clone().into());
    }

    match event.data() {
        Some(Data::Json(value)) => {
            envelope.insert("data".into(), value.clone());
        }
        Some(Data::Binary(bytes)) => {
            envelope.insert("data_base64".into(), general_purpose::STANDARD.encode(bytes).into());
        }
        None => {}
    }

    let body = serde_json::to_vec(&Value::Object(envelope))?;
    let headers = vec![(
        header::CONTENT_TYPE,
        HeaderValue::from_static(STRUCTURED_CONTENT_TYPE),
    )];
    Ok((headers, Bytes::from(body)))
}

/// Encode attributes as `ce-*` headers and the payload as the raw body.
pub fn encode_binary(event: &Event) -> Result<Encoded, EncodeError> {
    let mut headers = Vec::new();
    let mut push = |name: &str, value: &str| -> Result<(), EncodeError> {
        let invalid = || EncodeError::InvalidHeader { name: name.to_string() };
        let header_name = HeaderName::from_bytes(format!("{CE_PREFIX}{name}").as_bytes())
            .map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.push((header_name, header_value));
        Ok(())
    };

    push("specversion", event.spec_version())?;
    push("id", event.id())?;
    push("source", event.source())?;
    push("type", event.ty())?;
    if let Some(schema) = event.data_schema() {
        push("dataschema", schema)?;
    }
    if let Some(subject) = event.subject() {
        push("subject", subject)?;
    }
    if let Some(time) = event.time() {
        push("time", time)?;
    }
    for (name, value) in event.extensions() {
        push(name, value)?;
    }

    let (default_type, body) = match event.data() {
        Some(Data::Json(value)) => ("application/json", Bytes::from(serde_json::to_vec(value)?)),
        Some(Data::Binary(bytes)) => ("application/octet-stream", bytes.clone()),
        None => ("application/json", Bytes::new()),
    };
    let content_type = event.data_content_type().unwrap_or(default_type);
    let content_type = HeaderValue::from_str(content_type).map_err(|_| EncodeError::InvalidHeader {
        name: "datacontenttype".into(),
    })?;
    headers.push((header::CONTENT_TYPE, content_type));

    Ok((headers, body))
}

fn decode_binary(headers: &HeaderMap, body: &[u8]) -> Result<Event, EventError> {
    let text = |name: &str| -> Result<Option<String>, EventError> {
        match headers.get(name) {
            None => Ok(None),
            Some(value) => value
                .to_str()
                .map(|v| Some(v.to_string()))
                .map_err(|_| EventError::InvalidRequiredFields(format!("header `{name}` is not valid text"))),
        }
    };
    let required = |name: &str| -> Result<String, EventError> {
        text(name)?.ok_or_else(|| EventError::MissingRequiredFields(name.to_string()))
    };

    let mut builder = Event::builder(required("ce-type")?, required("ce-source")?)
        .spec_version(required("ce-specversion")?);
    if let Some(id) = text("ce-id")? {
        builder = builder.id(id);
    }
    if let Some(schema) = text("ce-dataschema")? {
        builder = builder.data_schema(schema);
    }
    if let Some(subject) = text("ce-subject")? {
        builder = builder.subject(subject);
    }
    if let Some(time) = text("ce-time")? {
        builder = builder.time(time);
    }

    const ATTRIBUTES: [&str; 7] = [
        "ce-specversion",
        "ce-id",
        "ce-source",
        "ce-type",
        "ce-dataschema",
        "ce-subject",
        "ce-time",
    ];
    for (name, value) in headers {
        let name = name.as_str();
        let Some(extension) = name.strip_prefix(CE_PREFIX) else {
            continue;
        };
        if ATTRIBUTES.contains(&name) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            builder = builder.extension(extension, value);
        }
    }

    let content_type = text(header::CONTENT_TYPE.as_str())?;
    if let Some(content_type) = &content_type {
        builder = builder.data_content_type(content_type.clone());
    }
    if !body.is_empty() {
        builder = builder.data(binary_payload(content_type.as_deref(), body));
    }

    builder.build()
}

fn binary_payload(content_type: Option<&str>, body: &[u8]) -> Data {
    let is_json = content_type.map_or(true, |ct| ct.to_ascii_lowercase().contains("json"));
    if is_json {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            return Data::Json(value);
        }
    }
    Data::Binary(Bytes::copy_from_slice(body))
}

fn decode_structured(body: &[u8]) -> Result<Event, EventError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(EventError::MissingRequiredFields(
            "specversion: no ce-specversion header and an empty body".into(),
        ));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| EventError::InvalidRequiredFields(format!("body is not a JSON event: {e}")))?;
    let Value::Object(mut envelope) = value else {
        return Err(EventError::InvalidRequiredFields("body is not a JSON object".into()));
    };

    let spec_version = take_required(&mut envelope, "specversion")?;
    let ty = take_required(&mut envelope, "type")?;
    let source = take_required(&mut envelope, "source")?;
    let mut builder = Event::builder(ty, source).spec_version(spec_version);

    type Setter = fn(EventBuilder, String) -> EventBuilder;
    let optional: [(&str, Setter); 5] = [
        ("id", |b, v| b.id(v)),
        ("datacontenttype", |b, v| b.data_content_type(v)),
        ("dataschema", |b, v| b.data_schema(v)),
        ("subject", |b, v| b.subject(v)),
        ("time", |b, v| b.time(v)),
    ];
    for (name, set) in optional {
        if let Some(value) = take_optional(&mut envelope, name)? {
            builder = set(builder, value);
        }
    }

    if let Some(data) = envelope.remove("data").filter(|v| !v.is_null()) {
        builder = builder.data(data);
    }
    if let Some(encoded) = take_optional(&mut envelope, "data_base64")? {
        let bytes = general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| EventError::InvalidRequiredFields(format!("data_base64: {e}")))?;
        builder = builder.data(bytes);
    }

    for (name, value) in envelope {
        match value {
            Value::Null => {}
            Value::String(s) => builder = builder.extension(name, s),
            other => builder = builder.extension(name, other.to_string()),
        }
    }

    builder.build()
}

fn take_required(envelope: &mut Map<String, Value>, name: &str) -> Result<String, EventError> {
    match envelope.remove(name) {
        None | Some(Value::Null) => Err(EventError::MissingRequiredFields(name.to_string())),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(EventError::InvalidRequiredFields(format!("{name} must be a string"))),
    }
}

fn take_optional(envelope: &mut Map<String, Value>, name: &str) -> Result<Option<String>, EventError> {
    match envelope.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(EventError::InvalidRequiredFields(format!("{name} must be a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header_map(headers: Vec<(HeaderName, HeaderValue)>) -> HeaderMap {
        headers.into_iter().collect()
    }

    fn ping() -> Event {
        Event::builder("dev.test.ping", "/test")
            .id("ping-1")
            .subject("unit")
            .extension("traceparent", "00-abc-def-01")
            .data(json!({"n": 1}))
            .build()
            .unwrap()
    }

    #[test]
    fn structured_round_trip_keeps_core_fields() {
        let event = ping();
        let (headers, body) = encode_structured(&event).unwrap();
        let decoded = decode(&header_map(headers), &body).unwrap();

        assert_eq!(decoded.ty(), "dev.test.ping");
        assert_eq!(decoded.source(), "/test");
        assert_eq!(decoded.id(), "ping-1");
        assert_eq!(decoded.subject(), Some("unit"));
        assert_eq!(decoded.extension("traceparent"), Some("00-abc-def-01"));
        assert_eq!(decoded.data(), Some(&Data::Json(json!({"n": 1}))));
    }

    #[test]
    fn binary_round_trip_keeps_core_fields() {
        let event = ping();
        let (headers, body) = encode_binary(&event).unwrap();
        let map = header_map(headers);
        assert_eq!(map["ce-type"], "dev.test.ping");
        assert_eq!(map["content-type"], "application/json");

        let decoded = decode(&map, &body).unwrap();
        assert_eq!(decoded.ty(), event.ty());
        assert_eq!(decoded.source(), event.source());
        assert_eq!(decoded.id(), event.id());
        assert_eq!(decoded.data(), event.data());
        assert_eq!(decoded.extension("traceparent"), Some("00-abc-def-01"));
    }

    #[test]
    fn binary_payloads_survive_both_modes() {
        let event = Event::builder("dev.test.blob", "/test")
            .data(vec![0u8, 159, 146, 150])
            .build()
            .unwrap();

        let (headers, body) = encode_structured(&event).unwrap();
        let decoded = decode(&header_map(headers), &body).unwrap();
        assert_eq!(decoded.data(), event.data());

        let (headers, body) = encode_binary(&event).unwrap();
        let decoded = decode(&header_map(headers), &body).unwrap();
        assert_eq!(decoded.data(), event.data());
    }

    #[test]
    fn structured_header_is_cloudevents_json() {
        let (headers, _) = encode_structured(&ping()).unwrap();
        assert_eq!(headers[0].0, header::CONTENT_TYPE);
        assert_eq!(headers[0].1, STRUCTURED_CONTENT_TYPE);
    }

    #[test]
    fn missing_id_is_generated() {
        let body = br#"{"specversion":"1.0","type":"t","source":"/s"}"#;
        let event = decode(&HeaderMap::new(), body).unwrap();
        assert!(!event.id().is_empty());
    }

    #[test]
    fn empty_body_is_missing_fields() {
        let err = decode(&HeaderMap::new(), b"").unwrap_err();
        assert!(matches!(err, EventError::MissingRequiredFields(_)));
    }

    #[test]
    fn malformed_json_is_invalid() {
        let err = decode(&HeaderMap::new(), b"{not json").unwrap_err();
        assert!(matches!(err, EventError::InvalidRequiredFields(_)));

        let err = decode(&HeaderMap::new(), b"[1,2,3]").unwrap_err();
        assert!(matches!(err, EventError::InvalidRequiredFields(_)));
    }

    #[test]
    fn structured_required_attributes_are_checked() {
        let missing_type = br#"{"specversion":"1.0","source":"/s"}"#;
        assert_eq!(
            decode(&HeaderMap::new(), missing_type).unwrap_err(),
            EventError::MissingRequiredFields("type".into())
        );

        let numeric_source = br#"{"specversion":"1.0","type":"t","source":7}"#;
        assert!(matches!(
            decode(&HeaderMap::new(), numeric_source),
            Err(EventError::InvalidRequiredFields(_))
        ));

        let bad_version = br#"{"specversion":"9.9","type":"t","source":"/s"}"#;
        assert!(matches!(
            decode(&HeaderMap::new(), bad_version),
            Err(EventError::InvalidRequiredFields(_))
        ));
    }

    #[test]
    fn binary_mode_requires_type_and_source() {
        let mut headers = HeaderMap::new();
        headers.insert("ce-specversion", HeaderValue::from_static("1.0"));
        headers.insert("ce-source", HeaderValue::from_static("/s"));
        assert_eq!(
            decode(&headers, b"").unwrap_err(),
            EventError::MissingRequiredFields("ce-type".into())
        );
    }

    #[test]
    fn binary_non_json_payload_stays_bytes() {
        let mut headers = HeaderMap::new();
        headers.insert("ce-specversion", HeaderValue::from_static("1.0"));
        headers.insert("ce-type", HeaderValue::from_static("t"));
        headers.insert("ce-source", HeaderValue::from_static("/s"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let event = decode(&headers, b"hello").unwrap();
        assert_eq!(event.data(), Some(&Data::Binary(Bytes::from("hello"))));
        assert_eq!(event.data_content_type(), Some("text/plain"));
    }

    #[test]
    fn header_unsafe_attribute_fails_binary_encoding() {
        let event = Event::builder("t", "/s").subject("line\nbreak").build().unwrap();
        assert!(matches!(
            encode_binary(&event),
            Err(EncodeError::InvalidHeader { .. })
        ));
    }
}
