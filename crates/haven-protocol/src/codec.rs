//! Codec for encoding and decoding Haven observer frames.
//!
//! Frames travel as JSON text over the observer WebSocket.

use thiserror::Error;

use crate::frames::{ClientFrame, ServerFrame};

/// Maximum accepted inbound frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// JSON encoding or decoding error.
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a server frame to its JSON text representation.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(frame: &ServerFrame) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode an observer frame from JSON text.
///
/// # Errors
///
/// Returns an error if the text is oversized or not a known frame.
pub fn decode_client(text: &str) -> Result<ClientFrame, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }

    Ok(serde_json::from_str(text)?)
}
