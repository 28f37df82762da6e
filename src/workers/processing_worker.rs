use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::db::{Database, ProcessingRelease, ReleaseStatus};

/// Tuning knobs for the processing worker
#[derive(Debug, Clone)]
pub struct ProcessingWorkerConfig {
    /// How often to poll for PROCESSING releases
    pub poll_interval: Duration,
    /// Fixed wait per release, standing in for real transcoding and
    /// metadata extraction
    pub processing_delay: Duration,
}

impl Default for ProcessingWorkerConfig {
    fn default() -> Self {
        ProcessingWorkerConfig {
            poll_interval: Duration::from_secs(10),
            processing_delay: Duration::from_secs(7),
        }
    }
}

/// Advances releases out of PROCESSING once their tracks are fully
/// ingested: a release moves to PENDING_REVIEW when it owns at least one
/// track and every track has a non-empty audio URL.
///
/// The predicate is re-evaluated from scratch every cycle and is idempotent,
/// so a stale read (a track completing between the poll and the check) is
/// simply resolved on the next cycle. A release that never satisfies the
/// predicate stays in PROCESSING indefinitely; there is deliberately no
/// timeout or escalation here.
#[derive(Debug, Clone)]
pub struct ProcessingWorker {
    db: Database,
    config: ProcessingWorkerConfig,
}

impl ProcessingWorker {
    pub fn new(db: Database, config: ProcessingWorkerConfig) -> Self {
        ProcessingWorker { db, config }
    }

    /// Spawn the poll loop. A cycle always runs to completion before the
    /// next tick fires, so cycles never overlap; cancellation is observed
    /// between ticks only.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(
            "Processing worker started (poll interval {:?})",
            self.config.poll_interval
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.poll_and_process().await {
                        error!("Error processing releases: {}", e);
                    }
                }
            }
        }

        info!("Processing worker stopped");
    }

    /// One poll cycle: evaluate every PROCESSING release sequentially.
    /// Per-release failures are logged and the release is left untouched
    /// for re-evaluation on the next cycle.
    pub async fn poll_and_process(&self) -> Result<(), sqlx::Error> {
        let releases = self.db.find_processing_releases().await?;
        for release in releases {
            if let Err(e) = self.process_release(&release).await {
                error!("Failed to process release {}: {}", release.id, e);
            }
        }

        Ok(())
    }

    /// Evaluate the completion predicate for one release and advance it to
    /// PENDING_REVIEW when satisfied.
    async fn process_release(&self, release: &ProcessingRelease) -> Result<(), sqlx::Error> {
        info!("Processing release {} ({})", release.id, release.title);

        // Stand-in for transcoding / metadata extraction.
        tokio::time::sleep(self.config.processing_delay).await;

        let completed = self.db.count_completed_tracks(&release.id).await?;

        if completed == release.track_count && release.track_count > 0 {
            self.db
                .update_release_status(&release.id, ReleaseStatus::PendingReview)
                .await?;
            info!(
                "Release {} ({}) processing completed, moved to PENDING_REVIEW",
                release.id, release.title
            );
        } else {
            info!(
                "Release {} still processing, waiting for all tracks ({}/{} uploaded)",
                release.id, completed, release.track_count
            );
        }

        Ok(())
    }
}
