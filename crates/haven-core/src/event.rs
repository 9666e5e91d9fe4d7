//! Event model for the routing core.
//!
//! Everything here is message-shaped: created on ingestion, dispatched,
//! then discarded. Persisted rows live in the store; observer connections
//! live in the hub.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// The typed event kinds produced by topic classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fall detected by the wearable belt.
    Fall,
    /// Help button pressed on the bedside unit.
    HelpRequest,
    /// Belt heartbeat/status report.
    BeltStatus,
    /// Environmental sensor reading.
    EnvTelemetry,
    /// Bedside unit heartbeat/status report.
    CommStatus,
}

impl EventKind {
    /// Stable lowercase label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fall => "fall",
            Self::HelpRequest => "help_request",
            Self::BeltStatus => "belt_status",
            Self::EnvTelemetry => "env_telemetry",
            Self::CommStatus => "comm_status",
        }
    }
}

/// A raw bus message as handed over by the transport adapter.
///
/// Carries no identity beyond topic and payload; consumed once by the
/// router and not retained.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Bus topic the message arrived on.
    pub topic: String,
    /// Undecoded payload bytes.
    pub payload: Bytes,
    /// When the adapter handed the message over.
    pub received_at: DateTime<Utc>,
}

impl RawMessage {
    /// Create a raw message stamped with the current time.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Error decoding a bus payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON.
    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload decoded but is not a JSON object.
    #[error("Payload is not a JSON object")]
    NotAnObject,
}

/// A decoded, classified event.
///
/// `kind` is derived deterministically from the topic; payloads on
/// unrecognized topics never reach this type.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Classified event kind.
    pub kind: EventKind,
    /// Decoded payload fields.
    pub fields: Map<String, Value>,
}

impl DecodedEvent {
    /// Decode a JSON object payload into an event of the given kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object.
    pub fn decode(kind: EventKind, payload: &[u8]) -> Result<Self, DecodeError> {
        match serde_json::from_slice::<Value>(payload)? {
            Value::Object(fields) => Ok(Self { kind, fields }),
            _ => Err(DecodeError::NotAnObject),
        }
    }

    /// Read a numeric field, if present and representable as `f64`.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// The decoded fields as a JSON value, for verbatim forwarding.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// A communication audit row: a device help signal or the echo of an
/// observer-originated display message. Appended once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunicationEvent {
    /// True for device-originated emergency signals.
    pub is_emergency: bool,
    /// Human-readable record of what happened.
    pub message: String,
}

impl CommunicationEvent {
    /// The row recorded when the bedside help button fires.
    #[must_use]
    pub fn emergency_button() -> Self {
        Self {
            is_emergency: true,
            message: "Emergency button pressed".to_string(),
        }
    }

    /// The audit row for an observer-originated display message.
    #[must_use]
    pub fn outbound_display(msg: &str, color: &str) -> Self {
        Self {
            is_emergency: false,
            message: format!("Sent to bedside display: {msg} ({color})"),
        }
    }
}

/// One environmental sample with its derived heat-stress index.
///
/// `heat_index_c` is always populated: the metric falls back to the raw
/// temperature when the formula leaves its domain.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentalReading {
    /// Temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Relative humidity, 0-100.
    pub humidity_pct: f64,
    /// Derived heat-stress index in degrees Celsius.
    pub heat_index_c: f64,
}
