//! Frame: the wire envelope for the whiteboard protocol.
//!
//! ARCHITECTURE
//! ============
//! Every message the hub sends is an `Envelope`: `{type, data, origin}`.
//! Clients send `{type, data}`; the hub never trusts a client-supplied
//! origin and stamps the sender's `ConnectionId` itself.
//!
//! DESIGN
//! ======
//! - Outbound tags are a closed `Event` enum, serialized in `snake_case`.
//! - Inbound frames are parsed into the closed `Inbound` enum. Each variant
//!   validates its own payload shape before anything touches storage, so
//!   handlers only ever see well-formed requests.
//! - `origin` is the empty string for server-initiated events.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::services::identity::ConnectionId;
use crate::services::spatial::{BoundingBox, MatchMode, SpatialError};
use crate::store::ElementId;

/// Padding applied to legacy bare-array `query` payloads.
pub const LEGACY_QUERY_PADDING: f64 = 2.0;

// =============================================================================
// OUTBOUND
// =============================================================================

/// Outbound type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Identify,
    ClientJoined,
    ClientLeft,
    AllClients,
    AllElements,
    Added,
    Deleted,
    Cleared,
    Ongoing,
    Matches,
    Error,
}

/// The message envelope sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event: Event,
    pub data: Value,
    #[serde(default, with = "origin_tag")]
    pub origin: Option<ConnectionId>,
}

impl Envelope {
    /// Server-initiated event (join, leave, clear, replies). Empty origin.
    pub fn server(event: Event, data: impl Into<Value>) -> Self {
        Self { event, data: data.into(), origin: None }
    }

    /// Event caused by a client; recipients can recognise their own echo.
    pub fn attributed(event: Event, data: impl Into<Value>, origin: ConnectionId) -> Self {
        Self { event, data: data.into(), origin: Some(origin) }
    }

    /// Serialize to the JSON text sent over the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

mod origin_tag {
    use super::*;

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Id(ConnectionId),
        Empty(String),
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(origin: &Option<ConnectionId>, serializer: S) -> Result<S::Ok, S::Error> {
        match origin {
            Some(id) => Repr::Id(*id).serialize(serializer),
            None => Repr::Empty(String::new()).serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ConnectionId>, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Id(id) => Ok(Some(id)),
            Repr::Empty(_) => Ok(None),
        }
    }
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured `error` envelopes and log lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Build the `error` envelope sent to a requester whose operation failed.
pub fn error_envelope(request: &str, err: &(impl ErrorCode + ?Sized)) -> Envelope {
    Envelope::server(
        Event::Error,
        serde_json::json!({
            "code": err.error_code(),
            "message": err.to_string(),
            "request": request,
        }),
    )
}

// =============================================================================
// INBOUND
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("malformed {kind} frame: {reason}")]
    Malformed { kind: &'static str, reason: String },
    #[error("unsupported frame type: {0}")]
    UnsupportedType(String),
}

impl ErrorCode for FrameError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) | Self::Malformed { .. } => "E_MALFORMED_FRAME",
            Self::UnsupportedType(_) => "E_UNSUPPORTED_TYPE",
        }
    }
}

/// Wire shape of a client frame before per-type validation.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// A validated client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Ephemeral in-progress stroke; relayed as `ongoing`, never stored.
    Drawing(Value),
    Add(AddRequest),
    Del(DelRequest),
    Get,
    Clear,
    Query(QueryRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddRequest {
    pub kind: String,
    pub bounds: BoundingBox,
    /// Everything the client sent; stored as the element content.
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelRequest {
    pub id: ElementId,
    /// Echoed verbatim in the `deleted` broadcast.
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Client-side tool tag, echoed back untouched.
    pub kind: Value,
    pub line: Vec<f64>,
    pub bounds: BoundingBox,
    pub padding: f64,
    pub mode: MatchMode,
}

#[derive(Deserialize)]
struct AddFields {
    #[serde(rename = "type")]
    kind: String,
    body: Vec<f64>,
}

#[derive(Deserialize)]
struct DelFields {
    id: ElementId,
}

#[derive(Deserialize)]
struct QueryFields {
    body: Vec<f64>,
    #[serde(default)]
    padding: f64,
    #[serde(default, rename = "type")]
    kind: Value,
    #[serde(default)]
    contain: bool,
}

impl Inbound {
    /// Parse and validate one inbound text frame.
    ///
    /// # Errors
    ///
    /// `InvalidJson` / `Malformed` when the frame or its payload has the wrong
    /// shape, `UnsupportedType` for unknown type tags.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        match raw.kind.as_str() {
            "drawing" => Ok(Self::Drawing(raw.data)),
            "add" => parse_add(raw.data).map(Self::Add),
            "del" => parse_del(raw.data).map(Self::Del),
            "get" => Ok(Self::Get),
            "clear" => Ok(Self::Clear),
            "query" => parse_query(raw.data).map(Self::Query),
            _ => Err(FrameError::UnsupportedType(raw.kind)),
        }
    }

    /// Type tag as it appeared on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Drawing(_) => "drawing",
            Self::Add(_) => "add",
            Self::Del(_) => "del",
            Self::Get => "get",
            Self::Clear => "clear",
            Self::Query(_) => "query",
        }
    }
}

fn malformed(kind: &'static str, reason: impl ToString) -> FrameError {
    FrameError::Malformed { kind, reason: reason.to_string() }
}

fn bounds_of(kind: &'static str, body: &[f64]) -> Result<BoundingBox, FrameError> {
    BoundingBox::from_coords(body).map_err(|e: SpatialError| malformed(kind, e))
}

fn parse_add(data: Value) -> Result<AddRequest, FrameError> {
    let Value::Object(payload) = data else {
        return Err(malformed("add", "data must be an object"));
    };
    let fields: AddFields =
        serde_json::from_value(Value::Object(payload.clone())).map_err(|e| malformed("add", e))?;
    let bounds = bounds_of("add", &fields.body)?;
    Ok(AddRequest { kind: fields.kind, bounds, payload })
}

fn parse_del(data: Value) -> Result<DelRequest, FrameError> {
    let fields: DelFields = serde_json::from_value(data.clone()).map_err(|e| malformed("del", e))?;
    Ok(DelRequest { id: fields.id, payload: data })
}

fn parse_query(data: Value) -> Result<QueryRequest, FrameError> {
    // Older clients send the bare coordinate list with a fixed padding.
    let fields = if data.is_array() {
        let body: Vec<f64> = serde_json::from_value(data).map_err(|e| malformed("query", e))?;
        QueryFields { body, padding: LEGACY_QUERY_PADDING, kind: Value::Null, contain: false }
    } else {
        serde_json::from_value(data).map_err(|e| malformed("query", e))?
    };

    if !fields.padding.is_finite() {
        return Err(malformed("query", "padding must be finite"));
    }
    let bounds = bounds_of("query", &fields.body)?.pad(fields.padding);
    Ok(QueryRequest {
        kind: fields.kind,
        line: fields.body,
        bounds,
        padding: fields.padding,
        mode: MatchMode::from_contain_flag(fields.contain),
    })
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
