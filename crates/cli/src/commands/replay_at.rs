// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use trunk_kernel::config::ResourceConfig;
use trunk_kernel::verify::state_hash_hex;

use super::table;
use crate::engine::{Cutoff, ForensicLog};

/// Time travel: the derived state as it stood at `at`.
pub fn run(path: &Path, at: &str, cfg: &ResourceConfig) -> anyhow::Result<()> {
    let log = ForensicLog::load(path, cfg)?;
    let cutoff = Cutoff::parse(at)?;
    let derivation = log.derive_to(cutoff, cfg);
    let state = &derivation.state;
    let applied = log.events_to(cutoff).len();

    println!("\nState {} ({} of {} events)", cutoff.label(), applied, log.events.len());
    println!(
        "Soil: {:.2} available / {:.2} capacity, hash {}\n",
        state.soil_available,
        state.soil_capacity,
        state_hash_hex(state)
    );

    let mut sprouts = table(vec!["Sprout", "Title", "Season", "Env", "State", "Water", "Result"]);
    for sprout in state.sprouts.values() {
        sprouts.add_row(vec![
            sprout.id.to_string(),
            sprout.title.clone(),
            sprout.season.to_string(),
            sprout.environment.to_string(),
            sprout.state.as_str().to_string(),
            sprout.water_entries.len().to_string(),
            sprout.result.map(|r| r.to_string()).unwrap_or_default(),
        ]);
    }
    println!("{sprouts}\n");

    if !state.leaves.is_empty() {
        let mut leaves = table(vec!["Leaf", "Name", "Twig", "Sprouts"]);
        for leaf in state.leaves.values() {
            leaves.add_row(vec![
                leaf.id.to_string(),
                leaf.name.clone(),
                leaf.twig_id.to_string(),
                state.sprouts_for_leaf(&leaf.id).len().to_string(),
            ]);
        }
        println!("{leaves}\n");
    }
    Ok(())
}
