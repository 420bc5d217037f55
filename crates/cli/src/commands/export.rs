// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use trunk_kernel::config::ResourceConfig;
use trunk_kernel::export::ExportDocument;

use crate::engine::ForensicLog;

/// Writes a `version: 1` export document, to `out` or stdout.
pub fn run(path: &Path, out: Option<&Path>, user_id: Option<String>, cfg: &ResourceConfig) -> anyhow::Result<()> {
    let log = ForensicLog::load(path, cfg)?;
    let doc = ExportDocument::new(&log.sorted_events(), user_id.or(log.user_id), Utc::now());
    let json = doc.to_json_pretty()?;

    match out {
        Some(out) => {
            std::fs::write(out, json).with_context(|| format!("Failed to write {}", out.display()))?;
            eprintln!("Exported {} events to {}", doc.events.len(), out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
