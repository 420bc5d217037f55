// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic Replay Logic.
//!
//! `derive_state` is a single left fold over the log sorted by
//! `(timestamp, clientId)`. The sort is stable, so events sharing both keys
//! keep their input order; any permutation of a set with distinct client ids
//! therefore folds in exactly the same order.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ResourceConfig;
use crate::event::TrunkEvent;
use crate::state::{ApplyOutcome, DerivedState, IgnoreReason};
use crate::types::ClientId;

/// Why an event contributed nothing to the derived state.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Failed to decode or check at the JSON edge; never reached the fold.
    Malformed(String),
    /// Decoded, but had nothing to act on.
    Ignored(IgnoreReason),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedEvent {
    pub client_id: Option<ClientId>,
    pub kind: Option<String>,
    pub reason: SkipReason,
}

/// Derived state plus a report of what was skipped, for callers that log.
#[derive(Clone, Debug, PartialEq)]
pub struct Derivation {
    pub state: DerivedState,
    pub skipped: Vec<SkippedEvent>,
}

/// Replay order shared by every client: `(timestamp, clientId)`. Events
/// without a client id sort before those with one at the same instant; the
/// stable sorts below keep input order for full ties.
pub fn replay_order(a: &TrunkEvent, b: &TrunkEvent) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.client_id.cmp(&b.client_id))
}

pub fn sort_events(events: &mut [TrunkEvent]) {
    events.sort_by(replay_order);
}

fn sorted(events: &[TrunkEvent]) -> Vec<&TrunkEvent> {
    let mut refs: Vec<&TrunkEvent> = events.iter().collect();
    refs.sort_by(|a, b| replay_order(a, b));
    refs
}

fn fold<'a>(events: impl IntoIterator<Item = &'a TrunkEvent>, cfg: &ResourceConfig) -> Derivation {
    let mut state = DerivedState::new(cfg);
    let mut skipped = Vec::new();
    for event in events {
        if let ApplyOutcome::Ignored(reason) = state.apply_event(event, cfg) {
            skipped.push(SkippedEvent {
                client_id: event.client_id.clone(),
                kind: Some(event.kind().as_str().to_string()),
                reason: SkipReason::Ignored(reason),
            });
        }
    }
    state.rebuild_indexes();
    Derivation { state, skipped }
}

/// Full derivation with a skip report.
pub fn derive(events: &[TrunkEvent], cfg: &ResourceConfig) -> Derivation {
    fold(sorted(events), cfg)
}

/// Derived state under the default resource contract.
pub fn derive_state(events: &[TrunkEvent]) -> DerivedState {
    derive_state_with(events, &ResourceConfig::default())
}

pub fn derive_state_with(events: &[TrunkEvent], cfg: &ResourceConfig) -> DerivedState {
    derive(events, cfg).state
}

/// State as it stood at `cutoff` (inclusive).
pub fn derive_at(events: &[TrunkEvent], cutoff: DateTime<Utc>, cfg: &ResourceConfig) -> Derivation {
    fold(sorted(events).into_iter().filter(|e| e.timestamp <= cutoff), cfg)
}

/// Derivation from loosely typed JSON, as read from storage or an import.
/// Events that fail to decode are skipped whole, never applied with defaults.
pub fn derive_from_values(values: &[Value], cfg: &ResourceConfig) -> Derivation {
    let mut events = Vec::with_capacity(values.len());
    let mut malformed = Vec::new();
    for value in values {
        match TrunkEvent::from_value(value.clone()) {
            Ok(event) => events.push(event),
            Err(e) => malformed.push(SkippedEvent {
                client_id: value.get("clientId").and_then(Value::as_str).map(ClientId::from),
                kind: value.get("type").and_then(Value::as_str).map(str::to_string),
                reason: SkipReason::Malformed(e.to_string()),
            }),
        }
    }
    let mut derivation = derive(&events, cfg);
    malformed.append(&mut derivation.skipped);
    derivation.skipped = malformed;
    derivation
}
