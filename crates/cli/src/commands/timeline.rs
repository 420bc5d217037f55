// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use trunk_kernel::config::ResourceConfig;
use trunk_kernel::state::{ApplyOutcome, DerivedState};
use trunk_kernel::time::format_timestamp;

use super::table;
use crate::engine::{summarize, ForensicLog};

/// Every event in replay order with its effect on soil.
pub fn run(path: &Path, cfg: &ResourceConfig, limit: Option<usize>) -> anyhow::Result<()> {
    let log = ForensicLog::load(path, cfg)?;
    let events = log.sorted_events();

    let mut timeline = table(vec!["#", "Timestamp", "Type", "Client ID", "Details", "Outcome", "Soil"]);
    let mut state = DerivedState::new(cfg);
    for (i, event) in events.iter().enumerate() {
        let outcome = match state.apply_event(event, cfg) {
            ApplyOutcome::Applied => "applied".to_string(),
            ApplyOutcome::Ignored(reason) => format!("ignored: {reason:?}"),
        };
        if limit.is_some_and(|n| i >= n) {
            continue;
        }
        timeline.add_row(vec![
            (i + 1).to_string(),
            format_timestamp(&event.timestamp),
            event.kind().as_str().to_string(),
            event.client_id.as_ref().map(|c| c.to_string()).unwrap_or_default(),
            summarize(event),
            outcome,
            format!("{:.2}/{:.2}", state.soil_available, state.soil_capacity),
        ]);
    }

    println!("\nEvent Timeline\n");
    println!("{timeline}\n");
    if let Some(n) = limit.filter(|n| *n < events.len()) {
        println!("({} more events not shown)", events.len() - n);
    }
    Ok(())
}
