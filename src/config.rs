use std::time::Duration;

use tracing::info;

use crate::cloud_storage::S3Config;
use crate::workers::{ProcessingWorkerConfig, UploadWorkerConfig};

/// Application configuration
/// In debug builds a .env file is loaded first; all values come from
/// VWAZA_* environment variables with sensible defaults.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_path: String,
    /// Object store credentials; None when no bucket is configured
    pub s3: Option<S3Config>,
    pub upload_worker: UploadWorkerConfig,
    pub processing_worker: ProcessingWorkerConfig,
}

impl Config {
    /// Load configuration from the environment
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Dev mode activated - loaded .env file");
            }
        }

        Self::from_env()
    }

    fn from_env() -> Self {
        let database_path =
            std::env::var("VWAZA_DB_PATH").unwrap_or_else(|_| "vwaza.db".to_string());

        let s3 = std::env::var("VWAZA_S3_BUCKET").ok().map(|bucket_name| S3Config {
            bucket_name,
            region: std::env::var("VWAZA_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: std::env::var("VWAZA_S3_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("VWAZA_S3_SECRET_ACCESS_KEY").unwrap_or_default(),
            endpoint_url: std::env::var("VWAZA_S3_ENDPOINT").ok(),
        });

        let upload_defaults = UploadWorkerConfig::default();
        let upload_worker = UploadWorkerConfig {
            poll_interval: env_duration_secs("VWAZA_UPLOAD_POLL_SECS", upload_defaults.poll_interval),
            batch_size: env_parse("VWAZA_UPLOAD_BATCH_SIZE", upload_defaults.batch_size),
            max_retries: env_parse("VWAZA_MAX_RETRIES", upload_defaults.max_retries),
            stuck_timeout: env_duration_secs("VWAZA_STUCK_TIMEOUT_SECS", upload_defaults.stuck_timeout),
        };

        let processing_defaults = ProcessingWorkerConfig::default();
        let processing_worker = ProcessingWorkerConfig {
            poll_interval: env_duration_secs(
                "VWAZA_PROCESSING_POLL_SECS",
                processing_defaults.poll_interval,
            ),
            processing_delay: env_duration_secs(
                "VWAZA_PROCESSING_DELAY_SECS",
                processing_defaults.processing_delay,
            ),
        };

        Config {
            database_path,
            s3,
            upload_worker,
            processing_worker,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
