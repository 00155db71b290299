//! # Error Types: Shared Error Hierarchy
//!
//! Errors shared by every crate in the workspace. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Canonicalization errors carry the underlying serde error.
//! - Validation errors name the offending field and what was expected, so a
//!   malformed record from a remote peer can be reported precisely.
//! - Configuration errors name the environment variable that was rejected.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A value did not have the shape required by the data model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A fact value was not a boolean, number, or string.
    #[error("fact {fact:?} of provider {provider:?} must be a boolean, number, or string, got {found}")]
    InvalidFactValue {
        /// Provider that reported the fact (empty when validating a bare fact map).
        provider: String,
        /// Fact identifier.
        fact: String,
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// A facts map, signature, or record was not a JSON object.
    #[error("{what} must be a JSON object, got {found}")]
    NotAnObject {
        /// What was being validated.
        what: &'static str,
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// A required string field was missing or empty.
    #[error("{field} must be a non-empty string")]
    EmptyField {
        /// Name of the field.
        field: &'static str,
    },

    /// A field was present but had the wrong type or range.
    #[error("{field}: {reason}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// An identifier failed its format check.
    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier {
        /// Identifier kind (e.g. "content hash").
        kind: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A numeric variable could not be parsed.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidNumber {
        /// Environment variable name.
        var: String,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// The signing key variable was set but malformed.
    #[error("{var} must be 64 hex characters (a 32-byte Ed25519 seed)")]
    InvalidSigningKey {
        /// Environment variable name.
        var: String,
    },
}

/// Name of the JSON type of `value`, for error messages.
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
