use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audio_metadata;
use crate::db::UploadJobType;

// Size limits from the platform's submission rules
const MAX_AUDIO_SIZE: usize = 100 * 1024 * 1024; // 100MB
const MAX_COVER_ART_SIZE: usize = 10 * 1024 * 1024; // 10MB

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac"];
const COVER_ART_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Error, Debug)]
pub enum CloudStorageError {
    #[error("S3 SDK error: {0}")]
    SdkError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),
}

/// S3 configuration for cloud storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>, // For MinIO/S3-compatible services
}

impl S3Config {
    pub fn validate(&self) -> Result<(), CloudStorageError> {
        if self.bucket_name.trim().is_empty() {
            return Err(CloudStorageError::Config(
                "Bucket name cannot be empty".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(CloudStorageError::Config(
                "Region cannot be empty".to_string(),
            ));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(CloudStorageError::Config(
                "Access key ID cannot be empty".to_string(),
            ));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(CloudStorageError::Config(
                "Secret access key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// An uploaded file: its public URL plus the duration extracted from audio
/// metadata. Duration is audio-only and best-effort; None is not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub url: String,
    pub duration_seconds: Option<i64>,
}

/// Trait for cloud storage operations (allows mocking for tests)
#[async_trait::async_trait]
pub trait CloudStorage: Send + Sync {
    /// Upload an object and return its public URL
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, CloudStorageError>;

    /// Delete an object by its public URL
    async fn delete(&self, url: &str) -> Result<(), CloudStorageError>;
}

/// Production S3 cloud storage implementation
pub struct S3CloudStorage {
    client: Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3CloudStorage {
    /// Create a new S3 cloud storage client
    pub async fn new(config: S3Config) -> Result<Self, CloudStorageError> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None, // session_token
            None, // expiration
            "vwaza-s3-config",
        );

        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        // Set custom endpoint if provided (for S3-compatible services)
        let public_base_url = match &config.endpoint_url {
            Some(endpoint) => {
                aws_config_builder = aws_config_builder.endpoint_url(endpoint.clone());
                format!(
                    "{}/{}",
                    endpoint.trim_end_matches('/'),
                    config.bucket_name
                )
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                config.bucket_name, config.region
            ),
        };

        let aws_config = aws_config_builder.load().await;
        let client = Client::new(&aws_config);

        Ok(S3CloudStorage {
            client,
            bucket_name: config.bucket_name,
            public_base_url,
        })
    }

    /// Extract the object key from a public URL issued by this client
    fn key_from_url<'a>(&self, url: &'a str) -> Result<&'a str, CloudStorageError> {
        url.strip_prefix(&self.public_base_url)
            .map(|key| key.trim_start_matches('/'))
            .ok_or_else(|| CloudStorageError::InvalidUrl(url.to_string()))
    }
}

#[async_trait::async_trait]
impl CloudStorage for S3CloudStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, CloudStorageError> {
        debug!("Uploading {} ({} bytes) to S3", key, data.len());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(data.to_vec().into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| CloudStorageError::SdkError(format!("Put object failed: {}", e)))?;

        let url = format!("{}/{}", self.public_base_url, key);
        info!("Uploaded object to {}", url);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), CloudStorageError> {
        let key = self.key_from_url(url)?;

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| CloudStorageError::SdkError(format!("Delete object failed: {}", e)))?;

        debug!("Deleted object {}", key);
        Ok(())
    }
}

/// Cloud storage manager that owns key layout, content types, submission
/// validation, and audio duration extraction on top of the raw storage.
#[derive(Clone)]
pub struct CloudStorageManager {
    storage: std::sync::Arc<dyn CloudStorage>,
}

impl std::fmt::Debug for CloudStorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudStorageManager")
            .field("storage", &"<dyn CloudStorage>")
            .finish()
    }
}

impl CloudStorageManager {
    /// Create a new cloud storage manager with S3 configuration
    pub async fn new(config: S3Config) -> Result<Self, CloudStorageError> {
        let storage = S3CloudStorage::new(config).await?;
        Ok(CloudStorageManager {
            storage: std::sync::Arc::new(storage),
        })
    }

    /// Create a manager over an existing storage implementation (tests)
    pub fn from_storage(storage: std::sync::Arc<dyn CloudStorage>) -> Self {
        CloudStorageManager { storage }
    }

    /// Upload a file and issue its public URL.
    ///
    /// Objects are organized by type: audio/{uuid}.mp3, cover_art/{uuid}.jpg.
    /// For audio uploads the duration is extracted from the bytes after the
    /// upload succeeds; extraction failure leaves duration_seconds as None.
    pub async fn upload_file(
        &self,
        data: &[u8],
        filename: &str,
        job_type: UploadJobType,
    ) -> Result<UploadedFile, CloudStorageError> {
        let extension = file_extension(filename);
        let key = format!(
            "{}/{}.{}",
            job_type.as_str().to_lowercase(),
            Uuid::new_v4(),
            extension
        );
        let content_type = content_type_for(&extension);

        let url = self.storage.upload(&key, data, content_type).await?;

        let duration_seconds = match job_type {
            UploadJobType::Audio => audio_metadata::extract_duration_seconds(data, &extension),
            UploadJobType::CoverArt => None,
        };

        Ok(UploadedFile {
            url,
            duration_seconds,
        })
    }

    /// Delete a previously uploaded file by its public URL
    pub async fn delete_file(&self, url: &str) -> Result<(), CloudStorageError> {
        self.storage.delete(url).await
    }
}

/// Validate a filename's extension against the accepted formats for its type
pub fn validate_file_type(filename: &str, job_type: UploadJobType) -> bool {
    let extension = file_extension(filename);
    match job_type {
        UploadJobType::Audio => AUDIO_EXTENSIONS.contains(&extension.as_str()),
        UploadJobType::CoverArt => COVER_ART_EXTENSIONS.contains(&extension.as_str()),
    }
}

/// Validate a file's size against the limit for its type
pub fn validate_file_size(size: usize, job_type: UploadJobType) -> bool {
    match job_type {
        UploadJobType::Audio => size <= MAX_AUDIO_SIZE,
        UploadJobType::CoverArt => size <= MAX_COVER_ART_SIZE,
    }
}

fn file_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
