// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::events::EventStore;

/// Flushes the store every `interval`, and once more when `shutdown` fires.
///
/// Failures are already logged and reflected in the store's persistence
/// status; the task keeps going.
pub fn spawn_flusher(store: Arc<EventStore>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = flush(&store).await;
                }
            }
        }

        match flush(&store).await {
            Some(Ok(n)) => tracing::info!("Final flush wrote {} log records", n),
            Some(Err(_)) => tracing::error!("Final flush failed; unsaved events will be lost on exit"),
            None => {}
        }
    })
}

async fn flush(store: &Arc<EventStore>) -> Option<Result<usize, crate::errors::StoreError>> {
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.flush_to_disk()).await {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::error!("Flush task panicked: {}", e);
            None
        }
    }
}
