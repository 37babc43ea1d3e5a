//! Background consumer of action completion events.
//!
//! Subscribes to the bus and feeds every `actions.completed` event to the
//! verification tracker. Runs as a long-lived task and shuts down when
//! cancelled or when the bus closes.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use dbpulse_events::{AnalysisEvent, BusMessage};

use crate::verification::VerificationTracker;

/// Background service routing completion events to the tracker.
pub struct CompletionListener;

impl CompletionListener {
    /// Run the completion loop.
    pub async fn run(
        tracker: Arc<VerificationTracker>,
        mut receiver: broadcast::Receiver<BusMessage>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Completion listener started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Completion listener stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(message) => {
                        if let AnalysisEvent::ActionCompleted(event) = message.event {
                            tracker.on_action_completed(&event).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            skipped = n,
                            "Completion listener lagged, some completions were missed"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, completion listener shutting down");
                        break;
                    }
                }
            }
        }
    }
}
