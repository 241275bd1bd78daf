//! Wire encoding errors

use thiserror::Error;

/// Errors raised while encoding or decoding broker messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// Payload is not valid JSON for the expected message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Message decoded but violates a protocol invariant.
    #[error("invalid message: {0}")]
    Invalid(String),
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;
