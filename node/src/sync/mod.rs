// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sync Engine
//!
//! Reconciles the local store with the remote event table.
//!
//! # Cycle
//! `Idle -> Pushing -> Pulling -> Idle`. A failed push returns to `Idle`
//! with every unsent event still pending; a failed pull returns to `Idle`
//! having merged nothing.
//!
//! # Guarantees
//! - An event is marked confirmed only after the remote accepted it
//! - Pulled events are appended, never replacing local ones
//! - Every remote call is bounded by the configured timeout; on expiry the
//!   call is dropped, which cancels it

pub mod realtime;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use trunk_kernel::types::ClientId;
use trunk_kernel::EventRow;

use crate::config::NodeConfig;
use crate::errors::SyncError;
use crate::events::EventStore;
use crate::network::{RemoteError, RemoteEventStore};
use crate::telemetry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Pushing,
    Pulling,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: Vec<(ClientId, RemoteError)>,
    /// Set when the remote was unreachable and the remaining events were not tried.
    pub aborted: Option<RemoteError>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    pub pushed: usize,
    pub push_failures: usize,
    pub pulled: usize,
    pub error: Option<RemoteError>,
}

impl SyncReport {
    /// Derived state only changes when something new arrived.
    pub fn needs_refresh(&self) -> bool {
        self.pulled > 0
    }
}

/// Sent whenever remote events were merged into the local store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteChange {
    pub added: usize,
}

pub struct SyncEngine {
    store: Arc<EventStore>,
    remote: Arc<dyn RemoteEventStore>,
    user_id: String,
    timeout: Duration,
    reconnect_delay: Duration,
    /// Serializes push and pull cycles.
    cycle: tokio::sync::Mutex<()>,
    /// Highest server id merged so far.
    cursor: Mutex<Option<i64>>,
    status: watch::Sender<SyncStatus>,
    changes: broadcast::Sender<RemoteChange>,
    realtime: Mutex<Option<CancellationToken>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SyncEngine {
    pub fn new(store: Arc<EventStore>, remote: Arc<dyn RemoteEventStore>, cfg: &NodeConfig) -> Self {
        let (status, _) = watch::channel(SyncStatus {
            phase: SyncPhase::Idle,
            last_error: None,
            last_synced_at: None,
        });
        let (changes, _) = broadcast::channel(64);
        Self {
            store,
            remote,
            user_id: cfg.user_id.clone(),
            timeout: cfg.network_timeout,
            reconnect_delay: cfg.reconnect_delay,
            cycle: tokio::sync::Mutex::new(()),
            cursor: Mutex::new(None),
            status,
            changes,
            realtime: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn changes(&self) -> broadcast::Receiver<RemoteChange> {
        self.changes.subscribe()
    }

    pub fn cursor(&self) -> Option<i64> {
        *lock(&self.cursor)
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, RemoteError>>) -> Result<T, RemoteError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.timeout)),
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    fn finish(&self, error: Option<&RemoteError>) {
        self.status.send_modify(|s| {
            s.phase = SyncPhase::Idle;
            s.last_error = error.map(|e| e.to_string());
            if error.is_none() {
                s.last_synced_at = Some(Utc::now());
            }
        });
    }

    async fn push_one(&self, row: &EventRow) -> Result<(), RemoteError> {
        self.bounded(self.remote.insert(row)).await?;
        self.store.mark_confirmed(&row.client_id);
        metrics::counter!(telemetry::EVENTS_PUSHED, 1);
        Ok(())
    }

    fn pending_rows(&self) -> Vec<EventRow> {
        self.store
            .pending_events()
            .iter()
            .filter_map(|event| match EventRow::from_event(event, &self.user_id) {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::warn!("Cannot push {}: {}", event.kind().as_str(), e);
                    None
                }
            })
            .collect()
    }

    async fn push_locked(&self) -> PushReport {
        self.set_phase(SyncPhase::Pushing);
        let mut report = PushReport::default();
        for row in self.pending_rows() {
            match self.push_one(&row).await {
                Ok(()) => report.pushed += 1,
                Err(e) => {
                    metrics::counter!(telemetry::PUSH_FAILURES, 1);
                    tracing::warn!("Push of {} failed, kept pending: {}", row.client_id, e);
                    report.failed.push((row.client_id.clone(), e.clone()));
                    // A timeout is charged to the row; only a refused connection
                    // says the rest would fail too.
                    if matches!(e, RemoteError::Network(_)) {
                        report.aborted = Some(e);
                        break;
                    }
                }
            }
        }
        if report.pushed > 0 {
            tracing::debug!("Pushed {} events", report.pushed);
        }
        report
    }

    /// Pushes every pending event in storage order. Stops early when the
    /// remote is unreachable; a rejected or timed-out event does not stop
    /// the others.
    pub async fn push(&self) -> PushReport {
        let _cycle = self.cycle.lock().await;
        let report = self.push_locked().await;
        self.finish(report.aborted.as_ref().or(report.failed.first().map(|(_, e)| e)));
        report
    }

    /// Retries every pending event on its own, whatever happens to the
    /// others. Returns how many went through.
    pub async fn retry_pending(&self) -> usize {
        let _cycle = self.cycle.lock().await;
        self.set_phase(SyncPhase::Pushing);
        let mut succeeded = 0;
        let mut last_error = None;
        for row in self.pending_rows() {
            match self.push_one(&row).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    metrics::counter!(telemetry::PUSH_FAILURES, 1);
                    tracing::warn!("Retry of {} failed: {}", row.client_id, e);
                    last_error = Some(e);
                }
            }
        }
        self.finish(last_error.as_ref());
        tracing::info!("Retried pending uploads: {} succeeded", succeeded);
        succeeded
    }

    async fn pull_locked(&self) -> Result<usize, RemoteError> {
        self.set_phase(SyncPhase::Pulling);
        let after = self.cursor();
        let rows = self.bounded(self.remote.select_after(&self.user_id, after)).await?;

        let mut high = after;
        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            high = high.max(row.id);
            match row.into_event() {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!("Skipping malformed remote row {}: {}", row.client_id, e),
            }
        }

        let added = self.store.merge_remote(events);
        *lock(&self.cursor) = high;
        metrics::counter!(telemetry::EVENTS_PULLED, added as u64);
        if added > 0 {
            tracing::debug!("Pulled {} new events (cursor {:?})", added, high);
            // No listeners is fine
            let _ = self.changes.send(RemoteChange { added });
        }
        Ok(added)
    }

    /// Merges remote events not yet known locally. Returns how many were new.
    pub async fn pull(&self) -> Result<usize, SyncError> {
        let _cycle = self.cycle.lock().await;
        let result = self.pull_locked().await;
        self.finish(result.as_ref().err());
        result.map_err(SyncError::from)
    }

    /// Push, then pull. Run when the app comes to the foreground.
    pub async fn smart_sync(&self) -> SyncReport {
        let _cycle = self.cycle.lock().await;
        let started = Instant::now();

        let push = self.push_locked().await;
        let mut report = SyncReport {
            pushed: push.pushed,
            push_failures: push.failed.len(),
            ..SyncReport::default()
        };

        if let Some(e) = push.aborted {
            report.error = Some(e);
        } else {
            match self.pull_locked().await {
                Ok(added) => report.pulled = added,
                Err(e) => report.error = Some(e),
            }
        }

        self.finish(report.error.as_ref());
        metrics::histogram!(telemetry::SYNC_DURATION, started.elapsed().as_secs_f64());
        match &report.error {
            None => tracing::info!("Sync complete: pushed {}, pulled {}", report.pushed, report.pulled),
            Some(e) => tracing::warn!("Sync incomplete: pushed {}, pulled {}: {}", report.pushed, report.pulled, e),
        }
        report
    }
}
