// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use trunk_kernel::error::KernelError;

use crate::events::event_log::EventLogError;
use crate::events::event_replay::ReplayError;
use crate::network::RemoteError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("could not read resource constants: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid resource constants: {0}")]
    Resources(#[from] KernelError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("rejected event: {0}")]
    Invalid(#[from] KernelError),
    #[error("same action submitted again within {window_ms}ms")]
    DuplicateSubmission { window_ms: u64 },
    /// The in-memory log is intact; changes may not survive a restart.
    #[error("local persistence failed: {0}")]
    Persistence(#[from] EventLogError),
    #[error("could not recover event log: {0}")]
    Recovery(#[from] ReplayError),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ServerError::Kernel(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
