// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Store - the single owner of the local log.
//!
//! Appends land in the journal at once and are staged for the on-disk log.
//! Staged records reach disk on the next `flush_to_disk()`, which the
//! background flusher calls every flush interval and on shutdown.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use trunk_kernel::config::ResourceConfig;
use trunk_kernel::event::EventPayload;
use trunk_kernel::replay::{SkipReason, SkippedEvent};
use trunk_kernel::types::ClientId;
use trunk_kernel::{Derivation, TrunkEvent};
use uuid::Uuid;

use super::event_journal::{Delivery, EventJournal};
use super::event_log::{EventLogWriter, LogEntry, LogSink};
use super::event_replay::recover;
use crate::config::NodeConfig;
use crate::errors::StoreError;
use crate::telemetry;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistenceStatus {
    Healthy,
    /// The last flush failed. Everything is still in memory and staged for
    /// the next attempt, but may not survive a restart.
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendReceipt {
    pub client_id: ClientId,
    /// Durability as of the end of the append.
    pub persistence: PersistenceStatus,
}

struct Inner {
    journal: EventJournal,
    /// Records not yet on disk. Always empty without a sink.
    staged: Vec<LogEntry>,
    sink: Option<Box<dyn LogSink>>,
    last_submission: Option<(EventPayload, Instant)>,
}

pub struct EventStore {
    inner: Mutex<Inner>,
    debounce: Duration,
    persistence: watch::Sender<PersistenceStatus>,
}

impl EventStore {
    fn build(journal: EventJournal, sink: Option<Box<dyn LogSink>>, debounce: Duration) -> Self {
        let (persistence, _) = watch::channel(PersistenceStatus::Healthy);
        metrics::gauge!(telemetry::PENDING_EVENTS, journal.pending_len() as f64);
        Self {
            inner: Mutex::new(Inner {
                journal,
                staged: Vec::new(),
                sink,
                last_submission: None,
            }),
            debounce,
            persistence,
        }
    }

    /// A store with no durable copy.
    pub fn in_memory(debounce: Duration) -> Self {
        Self::build(EventJournal::new(), None, debounce)
    }

    /// Recovers the journal from `path` and keeps appending to it.
    pub fn open(path: impl AsRef<Path>, debounce: Duration) -> Result<Self> {
        let path = path.as_ref();
        let (journal, valid_len) = recover(path)?;
        let writer = EventLogWriter::resume(path, valid_len)?;
        tracing::info!("Event store opened at {} ({} events)", writer.path().display(), journal.len());
        Ok(Self::build(journal, Some(Box::new(writer)), debounce))
    }

    /// A store writing through a caller-supplied sink.
    pub fn with_sink(journal: EventJournal, sink: Box<dyn LogSink>, debounce: Duration) -> Self {
        Self::build(journal, Some(sink), debounce)
    }

    pub fn from_config(cfg: &NodeConfig) -> Result<Self> {
        match &cfg.log_path {
            Some(path) => Self::open(path, cfg.debounce_window),
            None => Ok(Self::in_memory(cfg.debounce_window)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a user action. The event is visible to `events()` before this
    /// returns, whatever happens to the disk.
    ///
    /// A client id is assigned when absent; an event whose client id is
    /// already known is accepted without being recorded twice. The same
    /// payload submitted again inside the debounce window is rejected.
    pub fn append(&self, mut event: TrunkEvent) -> Result<AppendReceipt> {
        event.check()?;

        let mut inner = self.lock();
        if let Some(known) = event.client_id.as_ref().filter(|id| inner.journal.contains(id)) {
            tracing::debug!("Event {} already recorded", known);
            return Ok(AppendReceipt {
                client_id: known.clone(),
                persistence: *self.persistence.borrow(),
            });
        }
        if let Some((payload, at)) = &inner.last_submission {
            if *payload == event.payload && at.elapsed() < self.debounce {
                tracing::debug!("Rejected repeated {} within debounce window", event.kind().as_str());
                return Err(StoreError::DuplicateSubmission {
                    window_ms: self.debounce.as_millis() as u64,
                });
            }
        }

        let client_id = event
            .client_id
            .get_or_insert_with(|| ClientId::new(Uuid::new_v4().to_string()))
            .clone();

        inner.last_submission = Some((event.payload.clone(), Instant::now()));
        tracing::debug!("Appending {} ({})", event.kind().as_str(), client_id);
        Self::record(&mut inner, event, Delivery::Pending);
        metrics::counter!(telemetry::EVENTS_APPENDED, 1);
        metrics::gauge!(telemetry::PENDING_EVENTS, inner.journal.pending_len() as f64);

        // While degraded, every append retries the disk so recovery is noticed early.
        if *self.persistence.borrow() == PersistenceStatus::Degraded {
            let _ = self.flush_locked(&mut inner);
        }

        Ok(AppendReceipt {
            client_id,
            persistence: *self.persistence.borrow(),
        })
    }

    /// Stamps `payload` with the current time and appends it.
    pub fn append_now(&self, payload: EventPayload) -> Result<AppendReceipt> {
        self.append(TrunkEvent::new(payload, Utc::now()))
    }

    fn record(inner: &mut Inner, event: TrunkEvent, delivery: Delivery) -> bool {
        let entry = inner.sink.is_some().then(|| LogEntry::Event {
            event: event.clone(),
            confirmed: delivery == Delivery::Confirmed,
        });
        if !inner.journal.push(event, delivery) {
            return false;
        }
        if let Some(entry) = entry {
            inner.staged.push(entry);
        }
        true
    }

    /// All events in storage order.
    pub fn events(&self) -> Vec<TrunkEvent> {
        self.lock().journal.events()
    }

    pub fn pending_events(&self) -> Vec<TrunkEvent> {
        self.lock().journal.pending()
    }

    pub fn len(&self) -> usize {
        self.lock().journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.lock().journal.pending_len()
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.lock().journal.contains(client_id)
    }

    pub fn delivery(&self, client_id: &ClientId) -> Option<Delivery> {
        self.lock().journal.delivery(client_id)
    }

    /// Returns `true` if the event was pending.
    pub fn mark_confirmed(&self, client_id: &ClientId) -> bool {
        let mut inner = self.lock();
        if !inner.journal.mark_confirmed(client_id) {
            return false;
        }
        if inner.sink.is_some() {
            inner.staged.push(LogEntry::Confirmed {
                client_id: client_id.clone(),
            });
        }
        metrics::gauge!(telemetry::PENDING_EVENTS, inner.journal.pending_len() as f64);
        true
    }

    /// Appends events received from the remote as already confirmed.
    /// Known events are skipped, except that a local pending copy is marked
    /// confirmed since the remote evidently has it. Returns how many events
    /// were new.
    pub fn merge_remote(&self, events: Vec<TrunkEvent>) -> usize {
        let mut inner = self.lock();
        let mut added = 0;
        for event in events {
            let Some(client_id) = event.client_id.clone() else {
                tracing::warn!("Dropping remote {} without client id", event.kind().as_str());
                continue;
            };
            if inner.journal.contains(&client_id) {
                if inner.journal.mark_confirmed(&client_id) && inner.sink.is_some() {
                    inner.staged.push(LogEntry::Confirmed { client_id });
                }
                continue;
            }
            if Self::record(&mut inner, event, Delivery::Confirmed) {
                added += 1;
            }
        }
        metrics::gauge!(telemetry::PENDING_EVENTS, inner.journal.pending_len() as f64);
        added
    }

    /// Appends imported events as pending so they are pushed on the next
    /// sync. Events without a client id get one; known ids are skipped.
    /// Bypasses the debounce window. Returns how many events were new.
    pub fn import_events(&self, events: Vec<TrunkEvent>) -> usize {
        let mut inner = self.lock();
        let mut added = 0;
        for mut event in events {
            event
                .client_id
                .get_or_insert_with(|| ClientId::new(Uuid::new_v4().to_string()));
            if Self::record(&mut inner, event, Delivery::Pending) {
                added += 1;
            }
        }
        metrics::counter!(telemetry::EVENTS_APPENDED, added as u64);
        metrics::gauge!(telemetry::PENDING_EVENTS, inner.journal.pending_len() as f64);
        tracing::info!("Imported {} events", added);
        added
    }

    /// Writes every staged record to disk and returns how many were written.
    ///
    /// On failure the records stay staged, the status turns `Degraded`, and
    /// the error is returned so the caller can warn the user.
    pub fn flush_to_disk(&self) -> Result<usize> {
        let mut inner = self.lock();
        self.flush_locked(&mut inner)
    }

    fn flush_locked(&self, inner: &mut Inner) -> Result<usize> {
        let Inner { staged, sink, .. } = inner;
        let Some(sink) = sink.as_mut() else {
            return Ok(0);
        };
        if staged.is_empty() {
            return Ok(0);
        }

        // A partially written batch is retried whole; replay drops the duplicates.
        match sink.append_batch(staged.as_slice()) {
            Ok(()) => {
                let written = staged.len();
                staged.clear();
                self.set_persistence(PersistenceStatus::Healthy);
                tracing::debug!("Flushed {} log records", written);
                Ok(written)
            }
            Err(e) => {
                metrics::counter!(telemetry::PERSISTENCE_FAILURES, 1);
                if self.set_persistence(PersistenceStatus::Degraded) {
                    tracing::error!("Event log write failed, changes may not survive a restart: {}", e);
                } else {
                    tracing::warn!("Event log still not writable ({} records staged): {}", staged.len(), e);
                }
                Err(StoreError::Persistence(e))
            }
        }
    }

    /// Returns `true` if the status changed.
    fn set_persistence(&self, status: PersistenceStatus) -> bool {
        let changed = self.persistence.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed && status == PersistenceStatus::Healthy {
            tracing::info!("Event log writable again");
        }
        changed
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        *self.persistence.borrow()
    }

    pub fn subscribe_persistence(&self) -> watch::Receiver<PersistenceStatus> {
        self.persistence.subscribe()
    }

    pub fn staged_count(&self) -> usize {
        self.lock().staged.len()
    }

    /// Derives the current state and logs anything the fold skipped.
    pub fn derive(&self, cfg: &ResourceConfig) -> Derivation {
        let events = self.events();
        let derivation = trunk_kernel::derive(&events, cfg);
        for skipped in &derivation.skipped {
            log_skipped(skipped);
        }
        derivation
    }
}

fn log_skipped(skipped: &SkippedEvent) {
    let client_id = skipped.client_id.as_ref().map(ClientId::as_str).unwrap_or("-");
    let kind = skipped.kind.as_deref().unwrap_or("unknown");
    match &skipped.reason {
        SkipReason::Malformed(reason) => tracing::warn!("Skipped malformed {} ({}): {}", kind, client_id, reason),
        SkipReason::Ignored(reason) => tracing::debug!("Ignored {} ({}): {:?}", kind, client_id, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_log::EventLogError;
    use trunk_kernel::event::{LeafCreated, SunShone};
    use trunk_kernel::time::parse_timestamp;

    fn leaf(id: &str) -> TrunkEvent {
        TrunkEvent::new(
            EventPayload::LeafCreated(LeafCreated {
                leaf_id: id.into(),
                twig_id: "branch-2-twig-0".into(),
                name: "Marathon".into(),
            }),
            parse_timestamp("2025-02-01T10:00:00.000Z").unwrap(),
        )
    }

    struct BrokenDisk;

    impl LogSink for BrokenDisk {
        fn append_batch(&mut self, _entries: &[LogEntry]) -> std::result::Result<(), EventLogError> {
            Err(EventLogError::Io(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded")))
        }
    }

    #[test]
    fn test_append_assigns_client_id_and_is_visible() {
        let store = EventStore::in_memory(Duration::from_millis(500));
        let receipt = store.append(leaf("l1")).unwrap();
        assert!(!receipt.client_id.is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_events()[0].client_id.as_ref(), Some(&receipt.client_id));
    }

    #[test]
    fn test_rapid_duplicate_rejected() {
        let store = EventStore::in_memory(Duration::from_secs(60));
        store.append(leaf("l1")).unwrap();
        assert!(matches!(
            store.append(leaf("l1")),
            Err(StoreError::DuplicateSubmission { window_ms: 60_000 })
        ));
        store.append(leaf("l2")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_allowed_after_window() {
        let store = EventStore::in_memory(Duration::ZERO);
        store.append(leaf("l1")).unwrap();
        store.append(leaf("l1")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_known_client_id_is_idempotent() {
        let store = EventStore::in_memory(Duration::ZERO);
        store.append(leaf("l1").with_client_id("fixed")).unwrap();
        let receipt = store.append(leaf("l9").with_client_id("fixed")).unwrap();
        assert_eq!(receipt.client_id, ClientId::from("fixed"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_known_client_id_wins_over_debounce() {
        let store = EventStore::in_memory(Duration::from_secs(60));
        let first = store.append(leaf("l1").with_client_id("fixed")).unwrap();
        let again = store.append(leaf("l1").with_client_id("fixed")).unwrap();
        assert_eq!(again, first);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_malformed_event_rejected() {
        let store = EventStore::in_memory(Duration::ZERO);
        let bad = TrunkEvent::new(
            EventPayload::SunShone(SunShone {
                twig_id: "".into(),
                twig_label: "x".into(),
                content: "y".into(),
                prompt: None,
            }),
            Utc::now(),
        );
        assert!(matches!(store.append(bad), Err(StoreError::Invalid(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_remote_confirms_local_copy() {
        let store = EventStore::in_memory(Duration::ZERO);
        let receipt = store.append(leaf("l1")).unwrap();
        let mine = store.events().remove(0);

        let added = store.merge_remote(vec![mine, leaf("l2").with_client_id("other-device")]);
        assert_eq!(added, 1);
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.delivery(&receipt.client_id), Some(Delivery::Confirmed));
    }

    #[test]
    fn test_persistence_failure_keeps_event_in_memory() {
        let store = EventStore::with_sink(EventJournal::new(), Box::new(BrokenDisk), Duration::ZERO);
        let mut status = store.subscribe_persistence();

        store.append(leaf("l1")).unwrap();
        assert!(matches!(store.flush_to_disk(), Err(StoreError::Persistence(_))));
        assert_eq!(store.persistence_status(), PersistenceStatus::Degraded);
        assert!(status.has_changed().unwrap());

        let receipt = store.append(leaf("l2")).unwrap();
        assert_eq!(receipt.persistence, PersistenceStatus::Degraded);
        assert_eq!(store.len(), 2);
        assert_eq!(store.staged_count(), 2);
    }
}
