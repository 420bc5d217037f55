// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use trunk_kernel::export::import_json;
use trunk_kernel::verify::state_hash_hex;
use trunk_node::config::NodeConfig;
use trunk_node::events::EventStore;
use trunk_node::flusher::spawn_flusher;
use trunk_node::network::HttpRemote;
use trunk_node::server::{build_router, AppState};
use trunk_node::sync::SyncEngine;
use trunk_node::table::EventTable;
use trunk_node::telemetry::init_telemetry;

type MainResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "trunk-node")]
#[command(about = "Trunk event log store, sync engine and reference remote table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the reference remote event table.
    Serve,
    /// Push pending events and pull new ones once.
    Sync {
        /// Stay subscribed to realtime updates until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Show the local log and the state derived from it.
    Status,
    /// Import an export document (or legacy snapshot) into the local log.
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> MainResult {
    init_telemetry();
    let cli = Cli::parse();
    let cfg = NodeConfig::from_env()?;
    tracing::info!("Initializing Trunk Node for user {}", cfg.user_id);

    match cli.command {
        Commands::Serve => serve(cfg).await,
        Commands::Sync { watch } => sync(cfg, watch).await,
        Commands::Status => status(cfg),
        Commands::Import { file } => import(cfg, file),
    }
}

async fn serve(cfg: NodeConfig) -> MainResult {
    let state = AppState::new(Arc::new(EventTable::new()));
    let app = build_router(state, cfg.auth_token.clone());

    let listener = TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("Listening on {}", cfg.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

fn log_state(store: &EventStore, cfg: &NodeConfig) {
    let derived = store.derive(&cfg.resources).state;
    tracing::info!(
        "State: soil {:.2}/{:.2}, {} sprouts, {} leaves, hash {}",
        derived.soil_available,
        derived.soil_capacity,
        derived.sprouts.len(),
        derived.leaves.len(),
        state_hash_hex(&derived)
    );
}

async fn sync(cfg: NodeConfig, watch: bool) -> MainResult {
    let remote = HttpRemote::from_config(&cfg).ok_or("TRUNK_REMOTE_URL is not set")??;
    let store = Arc::new(EventStore::from_config(&cfg)?);
    let shutdown = CancellationToken::new();
    let flusher = spawn_flusher(Arc::clone(&store), cfg.flush_interval, shutdown.clone());

    let engine = Arc::new(SyncEngine::new(Arc::clone(&store), Arc::new(remote), &cfg));
    let report = engine.smart_sync().await;
    tracing::info!(
        "Pushed {}, pulled {}, {} still pending",
        report.pushed,
        report.pulled,
        store.pending_count()
    );
    log_state(&store, &cfg);

    if watch {
        let mut changes = engine.changes();
        engine.subscribe_realtime();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                change = changes.recv() => match change {
                    Ok(change) => {
                        tracing::info!("{} new events from another device", change.added);
                        log_state(&store, &cfg);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => log_state(&store, &cfg),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        engine.stop_realtime();
        // Whatever the user added meanwhile
        engine.push().await;
    }

    shutdown.cancel();
    flusher.await?;
    Ok(())
}

fn status(cfg: NodeConfig) -> MainResult {
    let store = EventStore::from_config(&cfg)?;
    tracing::info!("{} events, {} pending", store.len(), store.pending_count());
    log_state(&store, &cfg);

    let allowances = trunk_kernel::resources::allowances(&store.events(), &chrono::Local::now(), &cfg.resources);
    println!("{}", serde_json::to_string_pretty(&allowances)?);
    Ok(())
}

fn import(cfg: NodeConfig, file: PathBuf) -> MainResult {
    let raw = std::fs::read_to_string(&file)?;
    let outcome = import_json(&raw, Some(cfg.user_id.as_str()), &cfg.resources, Utc::now())?;
    for warning in &outcome.warnings {
        tracing::warn!("Import: {}", warning);
    }
    for error in &outcome.errors {
        tracing::error!("Import rejected: {}", error);
    }

    let store = EventStore::from_config(&cfg)?;
    let added = store.import_events(outcome.events);
    store.flush_to_disk()?;
    tracing::info!(
        "Imported {} events from v{} document ({} rejected)",
        added,
        outcome.version,
        outcome.errors.len()
    );
    Ok(())
}
