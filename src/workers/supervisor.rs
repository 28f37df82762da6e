use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cloud_storage::CloudStorageManager;
use crate::db::Database;
use crate::workers::processing_worker::{ProcessingWorker, ProcessingWorkerConfig};
use crate::workers::upload_worker::{UploadWorker, UploadWorkerConfig};

/// Composition root for the background workers. Invoked once at process
/// startup after the database is healthy, torn down on shutdown.
pub struct WorkerSupervisor {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSupervisor {
    /// Start the upload worker, then the processing worker
    pub fn start_all(
        db: Database,
        storage: CloudStorageManager,
        upload_config: UploadWorkerConfig,
        processing_config: ProcessingWorkerConfig,
    ) -> Self {
        info!("Starting all background workers...");

        let shutdown = CancellationToken::new();

        let upload_worker = UploadWorker::new(db.clone(), storage, upload_config);
        let upload_handle = upload_worker.spawn(shutdown.clone());

        let processing_worker = ProcessingWorker::new(db, processing_config);
        let processing_handle = processing_worker.spawn(shutdown.clone());

        info!("All background workers started successfully");

        WorkerSupervisor {
            shutdown,
            handles: vec![upload_handle, processing_handle],
        }
    }

    /// Signal both workers to stop accepting new poll ticks and wait for
    /// them to finish. In-flight ticks are not forcibly cancelled; they run
    /// to completion or natural failure.
    pub async fn stop_all(self) {
        info!("Stopping all background workers...");
        self.shutdown.cancel();

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task panicked during shutdown: {}", e);
            }
        }

        info!("All background workers stopped");
    }
}
