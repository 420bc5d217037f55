// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Realtime subscription.
//!
//! One background loop per engine: subscribe, catch up, then pull whenever
//! the remote reports a new row for this user. The loop reconnects after
//! `reconnect_delay` when the stream ends or fails.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{lock, SyncEngine};

impl SyncEngine {
    /// Starts (or restarts) the realtime loop. Any previous loop is cancelled
    /// first, so calling this repeatedly never stacks listeners.
    pub fn subscribe_realtime(self: &Arc<Self>) {
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.realtime).replace(token.clone()) {
            tracing::debug!("Replacing existing realtime subscription");
            previous.cancel();
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.realtime_loop(token).await });
    }

    pub fn stop_realtime(&self) {
        if let Some(token) = lock(&self.realtime).take() {
            token.cancel();
            tracing::info!("Realtime subscription stopped");
        }
    }

    pub fn is_realtime_active(&self) -> bool {
        lock(&self.realtime).as_ref().is_some_and(|t| !t.is_cancelled())
    }

    async fn realtime_loop(&self, token: CancellationToken) {
        loop {
            let subscribed = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                result = self.bounded(self.remote.subscribe(&self.user_id)) => result,
            };

            match subscribed {
                Ok(mut rows) => {
                    tracing::info!("Realtime subscription established for {}", self.user_id);
                    // Rows inserted while we were disconnected
                    if let Err(e) = self.pull().await {
                        tracing::warn!("Realtime catch-up pull failed: {}", e);
                    }

                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = token.cancelled() => return,
                            next = rows.next() => next,
                        };
                        match next {
                            Some(Ok(row)) => {
                                if self.store.contains(&row.client_id) {
                                    // Echo of our own push
                                    continue;
                                }
                                tracing::debug!("Realtime: new remote row {}", row.client_id);
                                if let Err(e) = self.pull().await {
                                    tracing::warn!("Realtime pull failed: {}", e);
                                }
                            }
                            Some(Err(e)) => {
                                tracing::warn!("Realtime stream error: {}", e);
                                break;
                            }
                            None => {
                                tracing::warn!("Realtime stream ended. Reconnecting...");
                                break;
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!("Realtime subscribe failed: {}. Retrying in {:?}", e, self.reconnect_delay),
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }
}
