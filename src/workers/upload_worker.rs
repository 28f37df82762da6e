use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cloud_storage::{CloudStorageError, CloudStorageManager};
use crate::db::{Database, DbUploadJob, UploadJobStatus, UploadJobType};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Cloud storage error: {0}")]
    CloudStorage(#[from] CloudStorageError),
}

/// Tuning knobs for the upload worker
#[derive(Debug, Clone)]
pub struct UploadWorkerConfig {
    /// How often to poll for pending jobs
    pub poll_interval: Duration,
    /// Max jobs drained per tick
    pub batch_size: i64,
    /// Failures beyond this count make a job permanently FAILED
    pub max_retries: i32,
    /// UPLOADING jobs older than this are presumed abandoned
    pub stuck_timeout: Duration,
}

impl Default for UploadWorkerConfig {
    fn default() -> Self {
        UploadWorkerConfig {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_retries: 3,
            stuck_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Drains queued upload jobs: reads the local file, uploads it to the
/// object store, and attaches the public URL (plus extracted duration for
/// audio) to the owning track or release.
///
/// Each job runs inside a single database transaction so the status marks
/// and the entity write land or roll back together with nothing half-done.
/// Failure bookkeeping happens outside that transaction and is the only way
/// a failed job re-enters PENDING.
#[derive(Debug, Clone)]
pub struct UploadWorker {
    db: Database,
    storage: CloudStorageManager,
    config: UploadWorkerConfig,
}

impl UploadWorker {
    pub fn new(db: Database, storage: CloudStorageManager, config: UploadWorkerConfig) -> Self {
        UploadWorker {
            db,
            storage,
            config,
        }
    }

    /// Spawn the poll loop. Cancellation is only observed between ticks, so
    /// an in-flight tick always runs to completion.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(
            "Upload worker started (poll interval {:?})",
            self.config.poll_interval
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.poll_and_dispatch().await {
                        error!("Error processing upload jobs: {}", e);
                    }
                }
            }
        }

        info!("Upload worker stopped");
    }

    /// One poll tick: recover stuck jobs, then drain up to batch_size
    /// pending jobs oldest-first. Individual job failures are contained and
    /// converted into retry bookkeeping; they never abort the tick.
    pub async fn poll_and_dispatch(&self) -> Result<(), sqlx::Error> {
        self.recover_stuck_jobs().await;

        let jobs = self.db.find_pending_jobs(self.config.batch_size).await?;
        for job in jobs {
            if let Err(e) = self.process_job(&job).await {
                self.handle_job_failure(&job, e).await;
            }
        }

        Ok(())
    }

    /// Reset jobs left UPLOADING past the stuck timeout, reclaiming work
    /// abandoned by a crashed worker. Sweep failures only log; the next tick
    /// tries again.
    async fn recover_stuck_jobs(&self) {
        let timeout = chrono::Duration::seconds(self.config.stuck_timeout.as_secs() as i64);
        match self.db.recover_stuck_jobs(timeout).await {
            Ok(reset) => {
                for job_id in reset {
                    warn!("Reset stuck upload job {} back to PENDING", job_id);
                }
            }
            Err(e) => error!("Stuck job recovery sweep failed: {}", e),
        }
    }

    /// Upload one job inside a single transaction: mark UPLOADING, read the
    /// local file, upload, write the URL onto the target entity, mark
    /// COMPLETED, commit. Any error rolls the whole transaction back -
    /// including the UPLOADING mark.
    async fn process_job(&self, job: &DbUploadJob) -> Result<(), JobError> {
        info!(
            "Processing upload job {} ({})",
            job.id,
            job.job_type.as_str()
        );

        let mut tx = self.db.pool().begin().await?;
        self.db.mark_job_uploading_tx(&mut tx, &job.id).await?;

        let data = tokio::fs::read(&job.local_path).await?;
        let filename = Path::new(&job.local_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.local_path.clone());

        let uploaded = self
            .storage
            .upload_file(&data, &filename, job.job_type)
            .await?;

        // From here the blob is durable; if any record write fails we must
        // remove the orphan after rolling back.
        let db_result: Result<(), sqlx::Error> = async {
            match job.job_type {
                UploadJobType::Audio => {
                    self.db
                        .set_track_audio_tx(
                            &mut tx,
                            &job.target_entity_id,
                            &uploaded.url,
                            uploaded.duration_seconds,
                        )
                        .await?
                }
                UploadJobType::CoverArt => {
                    self.db
                        .set_release_cover_art_tx(&mut tx, &job.target_entity_id, &uploaded.url)
                        .await?
                }
            }
            self.db.complete_job_tx(&mut tx, &job.id).await?;
            tx.commit().await
        }
        .await;

        if let Err(db_err) = db_result {
            self.cleanup_orphaned_blob(&uploaded.url).await;
            return Err(db_err.into());
        }

        info!("Upload job {} completed successfully", job.id);
        Ok(())
    }

    /// Best-effort removal of a blob whose record write failed. Its own
    /// failure is logged and discarded so it never masks the primary error.
    async fn cleanup_orphaned_blob(&self, url: &str) {
        if let Err(cleanup_err) = self.storage.delete_file(url).await {
            warn!("Failed to clean up orphaned upload {}: {}", url, cleanup_err);
        }
    }

    /// Record a failure as its own statement, outside the rolled-back upload
    /// transaction: either re-queue with retry_count + 1 or mark permanently
    /// FAILED once retries are exhausted.
    async fn handle_job_failure(&self, job: &DbUploadJob, error: JobError) {
        let message = error.to_string();
        error!(
            "Upload job {} failed (retry count {}): {}",
            job.id, job.retry_count, message
        );

        let result = if job.retry_count >= self.config.max_retries {
            error!(
                "Upload job {} permanently failed after max retries",
                job.id
            );
            self.db
                .mark_job_failure(&job.id, UploadJobStatus::Failed, job.retry_count, &message)
                .await
        } else {
            info!(
                "Upload job {} queued for retry ({}/{})",
                job.id,
                job.retry_count + 1,
                self.config.max_retries
            );
            self.db
                .mark_job_failure(
                    &job.id,
                    UploadJobStatus::Pending,
                    job.retry_count + 1,
                    &message,
                )
                .await
        };

        if let Err(e) = result {
            error!("Failed to record failure for job {}: {}", job.id, e);
        }
    }
}
