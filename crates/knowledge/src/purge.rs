//! Periodic purge of expired terminal records.
//!
//! Spawns a background loop that deletes resolved and superseded records
//! whose audit window has elapsed. Runs on a fixed interval until the
//! cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::KnowledgeStore;

/// Run the audit purge loop.
pub async fn run(store: Arc<dyn KnowledgeStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Audit purge job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Audit purge job stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(purged) => {
                        if purged > 0 {
                            tracing::info!(purged, "Audit purge: removed expired records");
                        } else {
                            tracing::debug!("Audit purge: nothing to remove");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Audit purge failed");
                    }
                }
            }
        }
    }
}
