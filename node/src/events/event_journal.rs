// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Journal - Runtime State Management
//!
//! Maintains the distinction between:
//! - **pending** = recorded locally, not yet accepted by the remote
//! - **confirmed** = accepted by (or received from) the remote
//!
//! # Semantics
//! - Events are kept in the order they entered this device
//! - Every event carries a client id; the id is unique within the journal
//! - Confirmation only flips delivery status, never the event itself

use std::collections::HashMap;

use trunk_kernel::types::ClientId;
use trunk_kernel::TrunkEvent;

use super::event_log::LogEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Confirmed,
}

#[derive(Clone, Debug)]
pub struct JournalEntry {
    pub event: TrunkEvent,
    pub delivery: Delivery,
}

/// Event Journal manages runtime event state
#[derive(Clone, Debug, Default)]
pub struct EventJournal {
    entries: Vec<JournalEntry>,
    /// client id -> position in `entries`
    positions: HashMap<ClientId, usize>,
    pending: usize,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Returns `false` (and changes nothing) when the
    /// client id is missing or already known.
    pub fn push(&mut self, event: TrunkEvent, delivery: Delivery) -> bool {
        let Some(client_id) = event.client_id.clone() else {
            return false;
        };
        if self.positions.contains_key(&client_id) {
            return false;
        }
        self.positions.insert(client_id, self.entries.len());
        if delivery == Delivery::Pending {
            self.pending += 1;
        }
        self.entries.push(JournalEntry { event, delivery });
        true
    }

    /// Returns `true` if the event was pending before the call.
    pub fn mark_confirmed(&mut self, client_id: &ClientId) -> bool {
        let Some(&pos) = self.positions.get(client_id) else {
            return false;
        };
        let entry = &mut self.entries[pos];
        if entry.delivery == Delivery::Confirmed {
            return false;
        }
        entry.delivery = Delivery::Confirmed;
        self.pending -= 1;
        true
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.positions.contains_key(client_id)
    }

    pub fn delivery(&self, client_id: &ClientId) -> Option<Delivery> {
        self.positions.get(client_id).map(|&pos| self.entries[pos].delivery)
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn events(&self) -> Vec<TrunkEvent> {
        self.entries.iter().map(|e| e.event.clone()).collect()
    }

    /// Pending events in the order they were recorded.
    pub fn pending(&self) -> Vec<TrunkEvent> {
        self.entries
            .iter()
            .filter(|e| e.delivery == Delivery::Pending)
            .map(|e| e.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending
    }

    /// Replays one on-disk record. Returns `false` for records that changed
    /// nothing (duplicates, confirmations of unknown events).
    pub fn apply_log_entry(&mut self, entry: LogEntry) -> bool {
        match entry {
            LogEntry::Event { event, confirmed } => {
                let delivery = if confirmed { Delivery::Confirmed } else { Delivery::Pending };
                self.push(event, delivery)
            }
            LogEntry::Confirmed { client_id } => self.mark_confirmed(&client_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trunk_kernel::event::{EventPayload, SproutWatered};
    use trunk_kernel::time::parse_timestamp;

    fn watered(client_id: Option<&str>) -> TrunkEvent {
        let mut event = TrunkEvent::new(
            EventPayload::SproutWatered(SproutWatered {
                sprout_id: "s1".into(),
                content: "ran 5k".into(),
                prompt: None,
            }),
            parse_timestamp("2025-01-01T08:00:00.000Z").unwrap(),
        );
        event.client_id = client_id.map(ClientId::from);
        event
    }

    #[test]
    fn test_journal_push_and_confirm() {
        let mut journal = EventJournal::new();
        assert!(journal.push(watered(Some("a")), Delivery::Pending));
        assert!(journal.push(watered(Some("b")), Delivery::Confirmed));
        assert_eq!(journal.pending_len(), 1);

        assert!(journal.mark_confirmed(&"a".into()));
        assert!(!journal.mark_confirmed(&"a".into()));
        assert_eq!(journal.pending_len(), 0);
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_journal_rejects_duplicates_and_anonymous_events() {
        let mut journal = EventJournal::new();
        assert!(journal.push(watered(Some("a")), Delivery::Pending));
        assert!(!journal.push(watered(Some("a")), Delivery::Confirmed));
        assert!(!journal.push(watered(None), Delivery::Pending));
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.delivery(&"a".into()), Some(Delivery::Pending));
    }

    #[test]
    fn test_journal_replays_log_entries() {
        let mut journal = EventJournal::new();
        journal.apply_log_entry(LogEntry::Event { event: watered(Some("a")), confirmed: false });
        journal.apply_log_entry(LogEntry::Event { event: watered(Some("b")), confirmed: false });
        journal.apply_log_entry(LogEntry::Confirmed { client_id: "b".into() });
        assert!(!journal.apply_log_entry(LogEntry::Confirmed { client_id: "zzz".into() }));

        let pending: Vec<_> = journal.pending().into_iter().filter_map(|e| e.client_id).collect();
        assert_eq!(pending, vec![ClientId::from("a")]);
    }
}
