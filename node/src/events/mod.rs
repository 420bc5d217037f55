// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Log Store
//!
//! # Architecture
//! - Journal = runtime state (every event plus its pending/confirmed status)
//! - Event Log = durable copy on disk (append-only frames, flushed in batches)
//! - Store = the single owner tying the two together
//!
//! # Guarantees
//! - An appended event is visible to the next `events()` read immediately
//! - Nothing is ever rewritten or deleted; confirmation is a new frame
//! - A failed disk write never loses the in-memory event

pub mod event_log;
pub mod event_journal;
pub mod event_replay;
pub mod event_store;

pub use event_journal::{Delivery, EventJournal};
pub use event_log::{EventLogWriter, LogEntry, LogSink};
pub use event_replay::{read_event_log, recover_journal, scan_event_log, ScannedLog};
pub use event_store::{AppendReceipt, EventStore, PersistenceStatus};
