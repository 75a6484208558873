//! Cipher error types.

use thiserror::Error;

/// Structural failures when decrypting a payload.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The payload is not valid base64.
    #[error("payload is not valid base64: {0}")]
    InvalidEncoding(String),
    /// The payload is shorter than the nonce prefix.
    #[error("payload too short: {len} bytes, need at least {min}")]
    Truncated {
        /// Decoded length.
        len: usize,
        /// Minimum length (the nonce size).
        min: usize,
    },
}
