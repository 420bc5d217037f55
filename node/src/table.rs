// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory remote event table.
//!
//! Backs the reference server and the in-process remote used by tests. Rows
//! are unique by `client_id`; server ids are assigned in insertion order and
//! never reused.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use trunk_kernel::types::ClientId;
use trunk_kernel::EventRow;

use crate::network::InsertStatus;

const FEED_CAPACITY: usize = 1024;

#[derive(Default)]
struct Rows {
    rows: Vec<EventRow>,
    client_ids: HashSet<ClientId>,
    next_id: i64,
}

pub struct EventTable {
    rows: Mutex<Rows>,
    feed: broadcast::Sender<EventRow>,
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTable {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            rows: Mutex::new(Rows {
                next_id: 1,
                ..Rows::default()
            }),
            feed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert-if-absent by client id. Returns the stored row either way.
    pub fn insert(&self, mut row: EventRow) -> (InsertStatus, EventRow) {
        let mut rows = self.lock();
        if rows.client_ids.contains(&row.client_id) {
            let existing = rows
                .rows
                .iter()
                .find(|r| r.client_id == row.client_id)
                .cloned()
                .unwrap_or(row);
            return (InsertStatus::AlreadyPresent, existing);
        }

        row.id = Some(rows.next_id);
        rows.next_id += 1;
        rows.client_ids.insert(row.client_id.clone());
        rows.rows.push(row.clone());
        drop(rows);

        // No subscribers is fine
        let _ = self.feed.send(row.clone());
        (InsertStatus::Inserted, row)
    }

    /// Rows of `user_id` with a server id above `after_id`, in id order.
    pub fn select(&self, user_id: &str, after_id: Option<i64>) -> Vec<EventRow> {
        let floor = after_id.unwrap_or(0);
        self.lock()
            .rows
            .iter()
            .filter(|r| r.user_id == user_id && r.id.unwrap_or(0) > floor)
            .cloned()
            .collect()
    }

    /// Every row inserted from now on, for all users.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRow> {
        self.feed.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.receiver_count()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
