// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use trunk_kernel::types::ClientId;
use trunk_kernel::EventRow;

use super::{InsertStatus, RemoteError, RemoteEventStore, RowStream};
use crate::table::EventTable;

#[derive(Default)]
struct Faults {
    offline: bool,
    failing_inserts: HashSet<ClientId>,
    stalled_inserts: HashSet<ClientId>,
    latency: Duration,
}

/// Remote event table living in this process.
///
/// Several engines sharing one table behave like devices sharing one
/// account. Faults can be injected to exercise retry and timeout paths.
pub struct MemoryRemote {
    table: Arc<EventTable>,
    faults: Mutex<Faults>,
    insert_calls: AtomicUsize,
}

impl MemoryRemote {
    pub fn new(table: Arc<EventTable>) -> Self {
        Self {
            table,
            faults: Mutex::new(Faults::default()),
            insert_calls: AtomicUsize::new(0),
        }
    }

    pub fn table(&self) -> &Arc<EventTable> {
        &self.table
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every call fails with a network error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.faults().offline = offline;
    }

    /// Inserts of this client id are rejected until faults are cleared.
    pub fn fail_inserts_for(&self, client_id: impl Into<ClientId>) {
        self.faults().failing_inserts.insert(client_id.into());
    }

    /// Inserts of this client id never answer until faults are cleared.
    pub fn stall_inserts_for(&self, client_id: impl Into<ClientId>) {
        self.faults().stalled_inserts.insert(client_id.into());
    }

    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    /// Delay applied before every insert and select.
    pub fn set_latency(&self, latency: Duration) {
        self.faults().latency = latency;
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) -> Result<(), RemoteError> {
        let (offline, latency) = {
            let faults = self.faults();
            (faults.offline, faults.latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if offline {
            return Err(RemoteError::Network("remote unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteEventStore for MemoryRemote {
    async fn insert(&self, row: &EventRow) -> Result<InsertStatus, RemoteError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await?;
        let stalled = self.faults().stalled_inserts.contains(&row.client_id);
        if stalled {
            futures::future::pending::<()>().await;
        }
        if self.faults().failing_inserts.contains(&row.client_id) {
            return Err(RemoteError::Rejected {
                status: 500,
                body: format!("insert of {} failed", row.client_id),
            });
        }
        Ok(self.table.insert(row.clone()).0)
    }

    async fn select_after(&self, user_id: &str, after_id: Option<i64>) -> Result<Vec<EventRow>, RemoteError> {
        self.delay().await?;
        Ok(self.table.select(user_id, after_id))
    }

    async fn subscribe(&self, user_id: &str) -> Result<RowStream, RemoteError> {
        if self.faults().offline {
            return Err(RemoteError::Network("remote unreachable".to_string()));
        }
        let user_id = user_id.to_string();
        let rows = BroadcastStream::new(self.table.subscribe()).filter_map(move |item| {
            let row = match item {
                Ok(row) if row.user_id == user_id => Some(Ok(row)),
                Ok(_) => None,
                // Lagged: the catch-up pull after the next notification covers the gap
                Err(e) => {
                    tracing::warn!("Realtime feed lagged: {}", e);
                    None
                }
            };
            futures::future::ready(row)
        });
        Ok(rows.boxed())
    }
}
