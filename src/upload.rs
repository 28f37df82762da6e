use thiserror::Error;
use tracing::warn;

use crate::cloud_storage::{
    validate_file_size, validate_file_type, CloudStorageError, CloudStorageManager,
};
use crate::db::{Database, DbUploadJob, ReleaseStatus, UploadJobType};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid audio file type. Supported: mp3, wav, flac, m4a, aac")]
    InvalidAudioFileType,
    #[error("Invalid image file type. Supported: jpg, jpeg, png, webp")]
    InvalidImageFileType,
    #[error("Audio file too large. Maximum size: 100MB")]
    AudioFileTooLarge,
    #[error("Cover art file too large. Maximum size: 10MB")]
    CoverArtTooLarge,
    #[error("Track not found")]
    TrackNotFound,
    #[error("Release not found")]
    ReleaseNotFound,
    #[error("Cover art can only be uploaded for draft releases")]
    ReleaseNotDraft,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Cloud storage error: {0}")]
    CloudStorage(#[from] CloudStorageError),
}

/// Synchronous upload path: validate, upload to the object store, then write
/// the resulting URL onto the owning entity inside one transaction.
///
/// The asynchronous variant goes through enqueue_upload_job instead; the
/// upload worker performs the same upload-and-attach later.
#[derive(Debug, Clone)]
pub struct UploadService {
    db: Database,
    storage: CloudStorageManager,
}

impl UploadService {
    pub fn new(db: Database, storage: CloudStorageManager) -> Self {
        UploadService { db, storage }
    }

    /// Upload a track's audio file and attach its URL and extracted duration.
    ///
    /// Returns the public URL and the duration that was written (the track
    /// keeps its placeholder when extraction yields nothing).
    pub async fn upload_audio_file(
        &self,
        track_id: &str,
        data: &[u8],
        filename: &str,
    ) -> Result<(String, Option<i64>), UploadError> {
        if !validate_file_type(filename, UploadJobType::Audio) {
            return Err(UploadError::InvalidAudioFileType);
        }
        if !validate_file_size(data.len(), UploadJobType::Audio) {
            return Err(UploadError::AudioFileTooLarge);
        }

        self.db
            .get_track(track_id)
            .await?
            .ok_or(UploadError::TrackNotFound)?;

        let uploaded = self
            .storage
            .upload_file(data, filename, UploadJobType::Audio)
            .await?;

        let result = async {
            let mut tx = self.db.pool().begin().await?;
            self.db
                .set_track_audio_tx(&mut tx, track_id, &uploaded.url, uploaded.duration_seconds)
                .await?;
            tx.commit().await
        }
        .await;

        if let Err(db_err) = result {
            // The blob is already durable but the record write failed; remove
            // the orphan best-effort without masking the primary error.
            if let Err(cleanup_err) = self.storage.delete_file(&uploaded.url).await {
                warn!(
                    "Failed to clean up orphaned upload {}: {}",
                    uploaded.url, cleanup_err
                );
            }
            return Err(db_err.into());
        }

        Ok((uploaded.url, uploaded.duration_seconds))
    }

    /// Upload a release's cover art and attach its URL. Only DRAFT releases
    /// accept cover art.
    pub async fn upload_cover_art(
        &self,
        release_id: &str,
        data: &[u8],
        filename: &str,
    ) -> Result<String, UploadError> {
        if !validate_file_type(filename, UploadJobType::CoverArt) {
            return Err(UploadError::InvalidImageFileType);
        }
        if !validate_file_size(data.len(), UploadJobType::CoverArt) {
            return Err(UploadError::CoverArtTooLarge);
        }

        let release = self
            .db
            .get_release(release_id)
            .await?
            .ok_or(UploadError::ReleaseNotFound)?;
        if release.status != ReleaseStatus::Draft {
            return Err(UploadError::ReleaseNotDraft);
        }

        let uploaded = self
            .storage
            .upload_file(data, filename, UploadJobType::CoverArt)
            .await?;

        let result = async {
            let mut tx = self.db.pool().begin().await?;
            self.db
                .set_release_cover_art_tx(&mut tx, release_id, &uploaded.url)
                .await?;
            tx.commit().await
        }
        .await;

        if let Err(db_err) = result {
            if let Err(cleanup_err) = self.storage.delete_file(&uploaded.url).await {
                warn!(
                    "Failed to clean up orphaned upload {}: {}",
                    uploaded.url, cleanup_err
                );
            }
            return Err(db_err.into());
        }

        Ok(uploaded.url)
    }

    /// Asynchronous submission path: queue an upload-and-attach job for the
    /// upload worker. The file at local_path must outlive the job.
    pub async fn enqueue_upload_job(
        &self,
        target_entity_id: &str,
        job_type: UploadJobType,
        local_path: &str,
    ) -> Result<DbUploadJob, UploadError> {
        match job_type {
            UploadJobType::Audio => {
                if !validate_file_type(local_path, UploadJobType::Audio) {
                    return Err(UploadError::InvalidAudioFileType);
                }
            }
            UploadJobType::CoverArt => {
                if !validate_file_type(local_path, UploadJobType::CoverArt) {
                    return Err(UploadError::InvalidImageFileType);
                }
            }
        }

        let job = DbUploadJob::new(target_entity_id, job_type, local_path);
        self.db.insert_upload_job(&job).await?;
        Ok(job)
    }
}
