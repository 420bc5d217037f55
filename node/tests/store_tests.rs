// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{leaf, plant, water};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use trunk_kernel::config::ResourceConfig;
use trunk_kernel::verify::state_hash;
use trunk_node::errors::StoreError;
use trunk_node::events::event_log::{EventLogError, EventLogWriter};
use trunk_node::events::{Delivery, EventJournal, EventStore, LogEntry, LogSink, PersistenceStatus};
use trunk_node::flusher::spawn_flusher;

#[test]
fn test_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("events.log");
    let cfg = ResourceConfig::default();

    let (hash, confirmed) = {
        let store = EventStore::open(&path, Duration::ZERO).unwrap();
        store.append(plant("s1", 0)).unwrap();
        let watered = store.append(water("s1", 5)).unwrap();
        store.append(leaf("l1", 6)).unwrap();
        assert!(store.mark_confirmed(&watered.client_id));
        assert_eq!(store.flush_to_disk().unwrap(), 4);
        (state_hash(&store.derive(&cfg).state), watered.client_id)
    };

    let reopened = EventStore::open(&path, Duration::ZERO).unwrap();
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.pending_count(), 2);
    assert_eq!(reopened.delivery(&confirmed), Some(Delivery::Confirmed));
    assert_eq!(state_hash(&reopened.derive(&cfg).state), hash);
}

#[test]
fn test_unflushed_events_are_lost_but_flushed_ones_survive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    {
        let store = EventStore::open(&path, Duration::ZERO).unwrap();
        store.append(plant("s1", 0)).unwrap();
        store.flush_to_disk().unwrap();
        store.append(water("s1", 1)).unwrap();
        // Dropped without a flush
    }
    assert_eq!(EventStore::open(&path, Duration::ZERO).unwrap().len(), 1);
}

#[test]
fn test_torn_tail_recovers_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    {
        let store = EventStore::open(&path, Duration::ZERO).unwrap();
        store.append(plant("s1", 0)).unwrap();
        store.append(water("s1", 1)).unwrap();
        store.flush_to_disk().unwrap();
    }
    let len = std::fs::metadata(&path).unwrap().len();
    std::fs::OpenOptions::new().write(true).open(&path).unwrap().set_len(len - 3).unwrap();

    {
        let store = EventStore::open(&path, Duration::ZERO).unwrap();
        assert_eq!(store.len(), 1);
        // Appending after recovery still works
        store.append(water("s1", 2)).unwrap();
        store.flush_to_disk().unwrap();
    }

    // The torn bytes are gone, so the new frame reads back cleanly
    let store = EventStore::open(&path, Duration::ZERO).unwrap();
    assert_eq!(store.len(), 2);
    store.append(leaf("l1", 3)).unwrap();
    store.flush_to_disk().unwrap();
    drop(store);
    assert_eq!(EventStore::open(&path, Duration::ZERO).unwrap().len(), 3);
}

#[test]
fn test_foreign_file_is_refused() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    std::fs::write(&path, b"{\"not\": \"a log\"}").unwrap();
    assert!(matches!(
        EventStore::open(&path, Duration::ZERO),
        Err(StoreError::Recovery(_))
    ));
}

/// Fails the first `failures` batches, then writes through.
struct FlakyDisk {
    failures: Arc<AtomicUsize>,
    inner: EventLogWriter,
}

impl LogSink for FlakyDisk {
    fn append_batch(&mut self, entries: &[LogEntry]) -> Result<(), EventLogError> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(EventLogError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.append_batch(entries)
    }
}

#[test]
fn test_persistence_failure_is_surfaced_and_recovers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    let failures = Arc::new(AtomicUsize::new(1));
    let sink = FlakyDisk {
        failures: failures.clone(),
        inner: EventLogWriter::open(&path).unwrap(),
    };
    let store = EventStore::with_sink(EventJournal::new(), Box::new(sink), Duration::ZERO);
    let mut status = store.subscribe_persistence();

    store.append(plant("s1", 0)).unwrap();
    let err = store.flush_to_disk().unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert_eq!(*status.borrow_and_update(), PersistenceStatus::Degraded);
    // Still usable in-session
    assert_eq!(store.events().len(), 1);

    // The next append retries the disk, which works again
    let receipt = store.append(water("s1", 1)).unwrap();
    assert_eq!(receipt.persistence, PersistenceStatus::Healthy);
    assert_eq!(store.staged_count(), 0);
    drop(store);

    assert_eq!(EventStore::open(&path, Duration::ZERO).unwrap().len(), 2);
}

#[tokio::test]
async fn test_flusher_writes_on_shutdown() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    let store = Arc::new(EventStore::open(&path, Duration::ZERO).unwrap());
    let shutdown = CancellationToken::new();
    let handle = spawn_flusher(store.clone(), Duration::from_secs(3600), shutdown.clone());

    store.append(plant("s1", 0)).unwrap();
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(store.staged_count(), 0);
    assert_eq!(EventStore::open(&path, Duration::ZERO).unwrap().len(), 1);
}
