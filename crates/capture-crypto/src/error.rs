//! Errors raised by cryptographic capabilities.

use thiserror::Error;

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key parsing or loading failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// A signature provider could not produce a signature.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// A signature string was malformed.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}
