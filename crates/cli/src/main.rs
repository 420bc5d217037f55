// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use trunk_cli::commands::{diff, export, inspect, replay_at, timeline, validate};
use trunk_kernel::config::ResourceConfig;

#[derive(Parser)]
#[command(name = "trunk")]
#[command(about = "Trunk Forensic CLI - inspect, replay and export event logs", long_about = None)]
struct Cli {
    /// Resource constants file replacing the built-in soil economy.
    #[arg(long, global = true, env = "TRUNK_RESOURCES")]
    resources: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a local event log or an export document.
    Inspect { path: PathBuf },
    /// Report rejected records, warnings and events that had no effect.
    Validate { path: PathBuf },
    /// List events in replay order with their effect on soil.
    Timeline {
        path: PathBuf,
        /// Show only the first N events.
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// Derive the state at a point: an event count or an ISO-8601 timestamp.
    ReplayAt {
        path: PathBuf,
        #[arg(long, short)]
        at: String,
    },
    /// Compare the derived state at two points.
    Diff {
        path: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Write a version 1 export document.
    Export {
        path: PathBuf,
        /// Output file; stdout when omitted.
        #[arg(long, short)]
        out: Option<PathBuf>,
        #[arg(long)]
        user_id: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match &cli.resources {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            ResourceConfig::from_json(&raw).context("Invalid resource constants")?
        }
        None => ResourceConfig::default(),
    };

    match cli.command {
        Commands::Inspect { path } => inspect::run(&path, &cfg),
        Commands::Validate { path } => validate::run(&path, &cfg),
        Commands::Timeline { path, limit } => timeline::run(&path, &cfg, limit),
        Commands::ReplayAt { path, at } => replay_at::run(&path, &at, &cfg),
        Commands::Diff { path, from, to } => diff::run(&path, &from, &to, &cfg),
        Commands::Export { path, out, user_id } => export::run(&path, out.as_deref(), user_id, &cfg),
    }
}
