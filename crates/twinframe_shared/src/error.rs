//! # Protocol Error Types

use thiserror::Error;

/// Errors raised while encoding, decoding or unpacking message envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The message could not be rendered to its wire form.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// The wire form was not a well-formed envelope.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// A message that must carry a transferred object arrived without one.
    #[error("message `{0}` arrived without its transferred surface")]
    MissingTransfer(&'static str),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
