//! # haven-protocol
//!
//! Wire protocol definitions for the Haven home-safety bridge.
//!
//! This crate defines the JSON shapes exchanged with dashboard observers
//! over the WebSocket endpoint, plus the display command published to the
//! bedside unit.
//!
//! ## Frame Types
//!
//! - `ServerFrame::Alert` - urgent events (fall detected, help requested)
//! - `ServerFrame::Status` - informational device updates
//! - `ClientFrame::SendMessage` - observer request to show text on the
//!   bedside display
//!
//! ## Example
//!
//! ```rust
//! use haven_protocol::{codec, AlertKind, ServerFrame};
//! use serde_json::json;
//!
//! let frame = ServerFrame::alert(AlertKind::Help, json!({"unit_id": "bedside"}));
//! let text = codec::encode(&frame).unwrap();
//! assert!(text.contains("\"event\":\"alert\""));
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode_client, encode, ProtocolError};
pub use frames::{
    Alert, AlertKind, ClientFrame, DisplayCommand, SendMessage, ServerFrame,
    DEFAULT_DISPLAY_COLOR, DEFAULT_DISPLAY_MESSAGE, DISPLAY_DURATION_SECS,
};
