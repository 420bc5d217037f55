// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Remote event table collaborators.

pub mod client;
pub mod memory;

pub use client::HttpRemote;
pub use memory::MemoryRemote;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use futures::Stream;
use thiserror::Error;
use trunk_kernel::EventRow;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote did not answer within {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("remote rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("unreadable remote response: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertStatus {
    Inserted,
    /// A row with the same client id already exists. Counts as success.
    AlreadyPresent,
}

pub type RowStream = BoxStream<'static, Result<EventRow, RemoteError>>;

/// The remote event table, keyed by client id.
#[async_trait]
pub trait RemoteEventStore: Send + Sync {
    /// Insert-if-absent.
    async fn insert(&self, row: &EventRow) -> Result<InsertStatus, RemoteError>;

    /// Rows of `user_id` with a server id strictly above `after_id`, in id order.
    async fn select_after(&self, user_id: &str, after_id: Option<i64>) -> Result<Vec<EventRow>, RemoteError>;

    /// Rows of `user_id` inserted after the subscription is established.
    async fn subscribe(&self, user_id: &str) -> Result<RowStream, RemoteError>;
}

/// Splits a byte stream into newline-delimited JSON rows.
///
/// A trailing line without a newline is dropped; the server always
/// terminates rows.
pub fn ndjson_rows<S, B, E>(bytes: S) -> RowStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let state = (Box::pin(bytes), Vec::<u8>::new());
    futures::stream::unfold(state, |(mut bytes, mut buffer)| async move {
        loop {
            if let Some(idx) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=idx).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let row = serde_json::from_str::<EventRow>(line).map_err(|e| RemoteError::Decode(e.to_string()));
                return Some((row, (bytes, buffer)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(RemoteError::Network(e.to_string())), (bytes, buffer))),
                None => return None,
            }
        }
    })
    .boxed()
}
