// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use trunk_kernel::config::ResourceConfig;
use trunk_kernel::replay::SkipReason;

use super::table;
use crate::engine::ForensicLog;

/// Reports every rejected record, warning and skipped event. Fails when any
/// record was rejected.
pub fn run(path: &Path, cfg: &ResourceConfig) -> anyhow::Result<()> {
    let log = ForensicLog::load(path, cfg)?;
    let derivation = log.derive(cfg);

    let mut findings = table(vec!["Severity", "Finding"]);
    for error in &log.import_errors {
        findings.add_row(vec!["ERROR", error.as_str()]);
    }
    for warning in &log.import_warnings {
        findings.add_row(vec!["WARN", warning.as_str()]);
    }
    for skipped in &derivation.skipped {
        let who = skipped.client_id.as_ref().map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
        let why = match &skipped.reason {
            SkipReason::Malformed(reason) => format!("malformed: {reason}"),
            SkipReason::Ignored(reason) => format!("no effect: {reason:?}"),
        };
        findings.add_row(vec!["INFO".to_string(), format!("{who}: {why}")]);
    }

    println!("\nValidation of {}", log.path.display());
    println!("{findings}\n");
    println!(
        "{} events accepted, {} rejected, {} warnings",
        log.events.len(),
        log.import_errors.len(),
        log.import_warnings.len()
    );

    if !log.import_errors.is_empty() {
        anyhow::bail!("{} records rejected", log.import_errors.len());
    }
    Ok(())
}
