//! Serialization for the hub wire protocol.
//!
//! Postcard encode/decode for [`ClientMessage`] and [`ServerMessage`].
//! No length framing is needed: WebSocket binary frames preserve message
//! boundaries.

use crate::wire::{ClientMessage, ServerMessage};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a [`ClientMessage`] into bytes.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the message cannot be serialized.
pub fn encode_client(msg: &ClientMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ClientMessage`] from bytes.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized.
pub fn decode_client(bytes: &[u8]) -> Result<ClientMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`ServerMessage`] into bytes.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the message cannot be serialized.
pub fn encode_server(msg: &ServerMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ServerMessage`] from bytes.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized.
pub fn decode_server(bytes: &[u8]) -> Result<ServerMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
