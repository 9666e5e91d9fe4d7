//! Frame types for the Haven observer protocol.
//!
//! Observers exchange JSON text frames shaped `{"event": ..., "data": ...}`,
//! matching the named events the dashboard listens for.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display message used when the observer omits one.
pub const DEFAULT_DISPLAY_MESSAGE: &str = "Hello";

/// Display color used when the observer omits one.
pub const DEFAULT_DISPLAY_COLOR: &str = "white";

/// How long the bedside unit shows a display command, in seconds.
pub const DISPLAY_DURATION_SECS: u32 = 5;

/// Alert categories delivered under the `alert` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// Fall detected by the wearable belt.
    #[serde(rename = "FALL")]
    Fall,
    /// Help requested from the bedside unit.
    #[serde(rename = "HELP")]
    Help,
}

/// Payload of an `alert` frame: the category plus the device payload verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert category.
    #[serde(rename = "type")]
    pub kind: AlertKind,
    /// The decoded device payload, forwarded untouched.
    pub data: Value,
}

/// A frame sent from the server to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Urgent alert (fall detected, help requested).
    Alert(Alert),
    /// Informational status update with the decoded payload.
    Status(Value),
}

impl ServerFrame {
    /// Build an alert frame wrapping the device payload verbatim.
    #[must_use]
    pub fn alert(kind: AlertKind, data: Value) -> Self {
        Self::Alert(Alert { kind, data })
    }

    /// Build a status frame.
    #[must_use]
    pub fn status(data: Value) -> Self {
        Self::Status(data)
    }

    /// The event name observers see for this frame.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Alert(_) => "alert",
            Self::Status(_) => "status",
        }
    }
}

/// A frame sent by an observer to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Request to show a message on the bedside display.
    SendMessage(SendMessage),
}

/// Body of a `send_message` frame.
///
/// Both fields are optional; defaults apply when the display command is
/// built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Display color name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The display command published to the bedside unit.
///
/// Wire shape consumed by the device firmware: `{msg, color, duration}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayCommand {
    /// Text shown on the display.
    pub msg: String,
    /// Display color name.
    pub color: String,
    /// Display duration in seconds.
    pub duration: u32,
}

impl DisplayCommand {
    /// Build a command from optional observer input, applying defaults for
    /// absent fields and fixing the duration.
    #[must_use]
    pub fn from_parts(msg: Option<String>, color: Option<String>) -> Self {
        Self {
            msg: msg.unwrap_or_else(|| DEFAULT_DISPLAY_MESSAGE.to_string()),
            color: color.unwrap_or_else(|| DEFAULT_DISPLAY_COLOR.to_string()),
            duration: DISPLAY_DURATION_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alert_frame_shape() {
        let frame = ServerFrame::alert(AlertKind::Help, json!({"unit_id": "bedside"}));
        let text = serde_json::to_string(&frame).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["event"], "alert");
        assert_eq!(value["data"]["type"], "HELP");
        assert_eq!(value["data"]["data"]["unit_id"], "bedside");
    }

    #[test]
    fn test_status_frame_shape() {
        let frame = ServerFrame::status(json!({"temp": 30, "humidity": 80}));
        let value: Value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["event"], "status");
        assert_eq!(value["data"]["temp"], 30);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            ServerFrame::alert(AlertKind::Fall, json!({})).event_name(),
            "alert"
        );
        assert_eq!(ServerFrame::status(json!({})).event_name(), "status");
    }

    #[test]
    fn test_client_frame_roundtrip() {
        let text = r#"{"event":"send_message","data":{"msg":"Take pills","color":"green"}}"#;
        let frame: ClientFrame = serde_json::from_str(text).unwrap();

        let ClientFrame::SendMessage(send) = frame;
        assert_eq!(send.msg.as_deref(), Some("Take pills"));
        assert_eq!(send.color.as_deref(), Some("green"));
    }

    #[test]
    fn test_client_frame_missing_fields() {
        let text = r#"{"event":"send_message","data":{}}"#;
        let frame: ClientFrame = serde_json::from_str(text).unwrap();

        let ClientFrame::SendMessage(send) = frame;
        assert!(send.msg.is_none());
        assert!(send.color.is_none());
    }

    #[test]
    fn test_display_command_defaults() {
        let command = DisplayCommand::from_parts(None, None);
        assert_eq!(command.msg, "Hello");
        assert_eq!(command.color, "white");
        assert_eq!(command.duration, 5);
    }

    #[test]
    fn test_display_command_wire_shape() {
        let command = DisplayCommand::from_parts(Some("Dinner".into()), Some("green".into()));
        let value = serde_json::to_value(&command).unwrap();

        assert_eq!(value, json!({"msg": "Dinner", "color": "green", "duration": 5}));
    }
}
