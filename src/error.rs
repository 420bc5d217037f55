// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// A timestamp string that is not RFC 3339 / ISO-8601.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// An event that is missing a required field or carries an impossible value.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    /// Wire rows are keyed by client id; an event without one cannot be sent.
    #[error("event has no client id")]
    MissingClientId,
    #[error("unsupported document version: {0}")]
    UnsupportedVersion(u64),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        KernelError::Json(e.to_string())
    }
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
