use tracing::info;

use vwaza_ingest::cloud_storage::CloudStorageManager;
use vwaza_ingest::config::Config;
use vwaza_ingest::db::Database;
use vwaza_ingest::workers::WorkerSupervisor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting vwaza-ingest v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load();

    let db = Database::new(&config.database_path).await?;
    info!("Database ready at {}", config.database_path);

    let s3_config = config
        .s3
        .ok_or("No object store configured; set VWAZA_S3_BUCKET")?;
    let storage = CloudStorageManager::new(s3_config).await?;

    let supervisor = WorkerSupervisor::start_all(
        db,
        storage,
        config.upload_worker,
        config.processing_worker,
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    supervisor.stop_all().await;
    Ok(())
}
