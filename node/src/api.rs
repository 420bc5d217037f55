// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};
use trunk_kernel::EventRow;

/// Insert body: a single row or a batch.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum InsertRequest {
    Many(Vec<EventRow>),
    One(EventRow),
}

impl InsertRequest {
    pub fn into_rows(self) -> Vec<EventRow> {
        match self {
            InsertRequest::Many(rows) => rows,
            InsertRequest::One(row) => vec![row],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct InsertResponse {
    pub inserted: usize,
    pub already_present: usize,
    pub rows: Vec<EventRow>,
}

#[derive(Deserialize)]
pub struct SelectParams {
    pub user_id: String,
    pub after_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct RealtimeParams {
    pub user_id: String,
}
