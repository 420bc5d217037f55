// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::BTreeMap;
use std::path::Path;

use trunk_kernel::config::ResourceConfig;
use trunk_kernel::verify::state_hash_hex;

use super::table;
use crate::engine::{ForensicLog, SourceKind};

pub fn run(path: &Path, cfg: &ResourceConfig) -> anyhow::Result<()> {
    let log = ForensicLog::load(path, cfg)?;
    let derivation = log.derive(cfg);
    let state = &derivation.state;

    println!("\nTrunk Log Report");
    println!("----------------");

    let mut summary = table(vec!["Property", "Value"]);
    summary.add_row(vec!["File".to_string(), log.path.display().to_string()]);
    match &log.kind {
        SourceKind::EventLog { pending } => {
            summary.add_row(vec!["Format".to_string(), "event log".to_string()]);
            summary.add_row(vec!["Pending upload".to_string(), pending.to_string()]);
        }
        SourceKind::Document { version } => {
            summary.add_row(vec!["Format".to_string(), format!("document v{version}")]);
            summary.add_row(vec!["Rejected records".to_string(), log.import_errors.len().to_string()]);
        }
    }
    if let Some(user) = &log.user_id {
        summary.add_row(vec!["User".to_string(), user.clone()]);
    }
    summary.add_row(vec!["Events".to_string(), log.events.len().to_string()]);
    if let (Some(first), Some(last)) = (log.events.iter().map(|e| e.timestamp).min(), log.events.iter().map(|e| e.timestamp).max()) {
        summary.add_row(vec!["Span".to_string(), format!("{} .. {}", first.to_rfc3339(), last.to_rfc3339())]);
    }
    summary.add_row(vec![
        "Soil".to_string(),
        format!("{:.2} available / {:.2} capacity", state.soil_available, state.soil_capacity),
    ]);
    summary.add_row(vec![
        "Sprouts".to_string(),
        format!(
            "{} total, {} active, {} completed",
            state.sprouts.len(),
            state.active_sprouts().count(),
            state.completed_sprouts().count()
        ),
    ]);
    summary.add_row(vec!["Leaves".to_string(), state.leaves.len().to_string()]);
    summary.add_row(vec!["Sun entries".to_string(), state.sun_entries.len().to_string()]);
    summary.add_row(vec!["Skipped events".to_string(), derivation.skipped.len().to_string()]);
    summary.add_row(vec!["State hash".to_string(), state_hash_hex(state)]);
    println!("{summary}\n");

    let mut by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in &log.events {
        *by_kind.entry(event.kind().as_str()).or_default() += 1;
    }
    let mut kinds = table(vec!["Event type", "Count"]);
    for (kind, count) in by_kind {
        kinds.add_row(vec![kind.to_string(), count.to_string()]);
    }
    println!("{kinds}\n");

    if let Err(e) = state.check_invariants() {
        anyhow::bail!("derived state violates an invariant: {e}");
    }
    Ok(())
}
