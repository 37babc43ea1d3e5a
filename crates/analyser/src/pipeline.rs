//! Snapshot processing pipeline.
//!
//! Consumes snapshots from the bus, runs the detection engine, registers
//! detections with the knowledge store, publishes newly accepted ones, and
//! feeds the snapshot to the verification tracker. Store failures downgrade
//! to warnings; a missed cycle self-corrects on the next snapshot.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use dbpulse_core::snapshot::NormalizedSnapshot;
use dbpulse_events::{AnalysisEvent, BusMessage, EventBus};
use dbpulse_knowledge::KnowledgeStore;

use crate::engine::DetectionEngine;
use crate::verification::VerificationTracker;

/// The detect → register → publish → verify loop for one snapshot stream.
pub struct Pipeline {
    engine: DetectionEngine,
    knowledge: Arc<dyn KnowledgeStore>,
    bus: Arc<EventBus>,
    tracker: Arc<VerificationTracker>,
}

impl Pipeline {
    pub fn new(
        engine: DetectionEngine,
        knowledge: Arc<dyn KnowledgeStore>,
        bus: Arc<EventBus>,
        tracker: Arc<VerificationTracker>,
    ) -> Self {
        Self {
            engine,
            knowledge,
            bus,
            tracker,
        }
    }

    /// Process one snapshot end to end. Returns the number of newly
    /// accepted detections.
    pub async fn process_snapshot(&self, snapshot: &NormalizedSnapshot) -> usize {
        let detections = self.engine.run(snapshot);
        let mut accepted = 0;

        for detection in detections {
            let key = detection.key.clone();
            match self.knowledge.register(detection.clone()).await {
                Ok(outcome) if outcome.accepted => {
                    accepted += 1;
                    tracing::info!(
                        detection_id = %outcome.detection_id,
                        key = %key,
                        severity = detection.severity.as_str(),
                        "New detection registered"
                    );
                    self.bus.publish(AnalysisEvent::Detection(detection));
                }
                Ok(outcome) => {
                    tracing::debug!(
                        detection_id = %outcome.detection_id,
                        key = %key,
                        "Duplicate detection, refreshed last-seen"
                    );
                }
                Err(e) => {
                    // Degrade gracefully: the condition will be re-detected
                    // on the next snapshot.
                    tracing::warn!(key = %key, error = %e, "Failed to register detection");
                }
            }
        }

        self.tracker.on_snapshot(&self.engine, snapshot).await;
        accepted
    }

    /// Run the pipeline loop over a bus subscription until cancelled or the
    /// channel closes. Non-snapshot events are skipped.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: broadcast::Receiver<BusMessage>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Snapshot pipeline started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Snapshot pipeline stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(message) => {
                        if let AnalysisEvent::Snapshot(snapshot) = message.event {
                            self.process_snapshot(&snapshot).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Snapshot pipeline lagged, snapshots dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, snapshot pipeline shutting down");
                        break;
                    }
                }
            }
        }
    }
}
