// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::HashSet;
use std::path::Path;

use trunk_kernel::config::ResourceConfig;
use trunk_kernel::time::format_timestamp;
use trunk_kernel::verify::state_hash_hex;

use super::table;
use crate::engine::{summarize, Cutoff, ForensicLog};

/// Compares the derived state at two points and lists the events in between.
pub fn run(path: &Path, from: &str, to: &str, cfg: &ResourceConfig) -> anyhow::Result<()> {
    let log = ForensicLog::load(path, cfg)?;
    let (from, to) = (Cutoff::parse(from)?, Cutoff::parse(to)?);

    let state_a = log.derive_to(from, cfg).state;
    let state_b = log.derive_to(to, cfg).state;
    let (hash_a, hash_b) = (state_hash_hex(&state_a), state_hash_hex(&state_b));
    let status = if hash_a == hash_b { "IDENTICAL" } else { "DRIFTED" };

    let mut comparison = table(vec!["Property", "From", "To"]);
    comparison.add_row(vec!["Point".to_string(), from.label(), to.label()]);
    comparison.add_row(vec!["Hash".to_string(), hash_a, hash_b]);
    comparison.add_row(vec![
        "Soil capacity".to_string(),
        format!("{:.4}", state_a.soil_capacity),
        format!("{:.4}", state_b.soil_capacity),
    ]);
    comparison.add_row(vec![
        "Soil available".to_string(),
        format!("{:.4}", state_a.soil_available),
        format!("{:.4}", state_b.soil_available),
    ]);
    comparison.add_row(vec![
        "Sprouts".to_string(),
        state_a.sprouts.len().to_string(),
        state_b.sprouts.len().to_string(),
    ]);
    println!("\nState Comparison ({status})");
    println!("{comparison}\n");

    if status == "IDENTICAL" {
        return Ok(());
    }

    // Events present at one point but not the other
    let events_a = log.events_to(from);
    let events_b = log.events_to(to);
    let seen_a: HashSet<_> = events_a.iter().map(|e| (e.timestamp, e.client_id.clone())).collect();
    let seen_b: HashSet<_> = events_b.iter().map(|e| (e.timestamp, e.client_id.clone())).collect();
    let mut drift = table(vec!["Side", "Timestamp", "Type", "Details"]);
    for (side, events, other) in [("+", &events_b, &seen_a), ("-", &events_a, &seen_b)] {
        for event in events.iter().filter(|e| !other.contains(&(e.timestamp, e.client_id.clone()))) {
            drift.add_row(vec![
                side.to_string(),
                format_timestamp(&event.timestamp),
                event.kind().as_str().to_string(),
                summarize(event),
            ]);
        }
    }
    println!("Drift Analysis");
    println!("{drift}\n");

    let mut changed = table(vec!["Sprout", "From", "To"]);
    for (id, after) in &state_b.sprouts {
        let before = state_a.sprouts.get(id).map(|s| s.state.as_str()).unwrap_or("-");
        if before != after.state.as_str() {
            changed.add_row(vec![id.to_string(), before.to_string(), after.state.as_str().to_string()]);
        }
    }
    for id in state_a.sprouts.keys().filter(|id| !state_b.sprouts.contains_key(*id)) {
        changed.add_row(vec![id.to_string(), state_a.sprouts[id].state.as_str().to_string(), "-".to_string()]);
    }
    println!("Sprout Changes");
    println!("{changed}\n");
    Ok(())
}
