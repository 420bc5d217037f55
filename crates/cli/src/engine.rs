// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use trunk_kernel::config::ResourceConfig;
use trunk_kernel::event::EventPayload;
use trunk_kernel::export::import_json;
use trunk_kernel::replay::{derive, derive_at, sort_events};
use trunk_kernel::time::parse_timestamp;
use trunk_kernel::{Derivation, TrunkEvent};
use trunk_node::events::event_log::MAGIC;
use trunk_node::events::recover_journal;

#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    /// A device's local event log.
    EventLog { pending: usize },
    /// An export document or legacy entity snapshot.
    Document { version: u64 },
}

/// Everything the forensic commands read, from either kind of file.
pub struct ForensicLog {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub user_id: Option<String>,
    /// Storage order.
    pub events: Vec<TrunkEvent>,
    pub import_errors: Vec<String>,
    pub import_warnings: Vec<String>,
}

/// Point in replay order: the first `n` events, or everything up to an instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cutoff {
    Events(usize),
    At(DateTime<Utc>),
}

impl Cutoff {
    pub fn parse(raw: &str) -> Result<Self> {
        if let Ok(n) = raw.parse::<usize>() {
            return Ok(Cutoff::Events(n));
        }
        let at = parse_timestamp(raw)
            .with_context(|| format!("'{raw}' is neither an event count nor an ISO-8601 timestamp"))?;
        Ok(Cutoff::At(at))
    }

    pub fn label(&self) -> String {
        match self {
            Cutoff::Events(n) => format!("after {n} events"),
            Cutoff::At(at) => format!("at {}", trunk_kernel::time::format_timestamp(at)),
        }
    }
}

fn is_event_log(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(file.read(&mut magic)? == magic.len() && magic == MAGIC)
}

impl ForensicLog {
    pub fn load(path: impl AsRef<Path>, cfg: &ResourceConfig) -> Result<Self> {
        let path = path.as_ref();
        if is_event_log(path)? {
            let journal = recover_journal(path).context("Failed to recover event log")?;
            return Ok(Self {
                path: path.to_path_buf(),
                kind: SourceKind::EventLog {
                    pending: journal.pending_len(),
                },
                user_id: None,
                events: journal.events(),
                import_errors: Vec::new(),
                import_warnings: Vec::new(),
            });
        }

        let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let outcome = import_json(&raw, None, cfg, Utc::now()).context("Not an event log or a readable export document")?;
        Ok(Self {
            path: path.to_path_buf(),
            kind: SourceKind::Document {
                version: outcome.version,
            },
            user_id: outcome.user_id,
            events: outcome.events,
            import_errors: outcome.errors,
            import_warnings: outcome.warnings,
        })
    }

    /// Replay order.
    pub fn sorted_events(&self) -> Vec<TrunkEvent> {
        let mut events = self.events.clone();
        sort_events(&mut events);
        events
    }

    pub fn derive(&self, cfg: &ResourceConfig) -> Derivation {
        derive(&self.events, cfg)
    }

    pub fn derive_to(&self, cutoff: Cutoff, cfg: &ResourceConfig) -> Derivation {
        match cutoff {
            Cutoff::Events(n) => {
                let sorted = self.sorted_events();
                derive(&sorted[..n.min(sorted.len())], cfg)
            }
            Cutoff::At(at) => derive_at(&self.events, at, cfg),
        }
    }

    /// Events folded in by `cutoff`, in replay order.
    pub fn events_to(&self, cutoff: Cutoff) -> Vec<TrunkEvent> {
        let sorted = self.sorted_events();
        match cutoff {
            Cutoff::Events(n) => sorted.into_iter().take(n).collect(),
            Cutoff::At(at) => sorted.into_iter().filter(|e| e.timestamp <= at).collect(),
        }
    }
}

/// One-line human summary of an event.
pub fn summarize(event: &TrunkEvent) -> String {
    match &event.payload {
        EventPayload::SproutPlanted(p) => {
            format!("{} \"{}\" ({} {}, cost {})", p.sprout_id, p.title, p.season, p.environment, p.soil_cost)
        }
        EventPayload::SproutWatered(p) => format!("{}: {}", p.sprout_id, p.content),
        EventPayload::SproutHarvested(p) => {
            format!("{} result {} (+{:.4} capacity)", p.sprout_id, p.result, p.capacity_gained)
        }
        EventPayload::SproutUprooted(p) => format!("{} (+{:.2} soil)", p.sprout_id, p.soil_returned),
        EventPayload::SunShone(p) => format!("{}: {}", p.twig_label, p.content),
        EventPayload::LeafCreated(p) => format!("{} \"{}\" on {}", p.leaf_id, p.name, p.twig_id),
        EventPayload::SproutEdited(p) => match &p.title {
            Some(title) => format!("{} retitled \"{}\"", p.sprout_id, title),
            None => format!("{} edited", p.sprout_id),
        },
    }
}
