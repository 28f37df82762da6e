use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

// String constants for SQL DEFAULT clauses (keep in sync with as_str())
const RELEASE_STATUS_DRAFT: &str = "DRAFT";
const RELEASE_STATUS_PROCESSING: &str = "PROCESSING";
const RELEASE_STATUS_PENDING_REVIEW: &str = "PENDING_REVIEW";
const RELEASE_STATUS_PUBLISHED: &str = "PUBLISHED";
const RELEASE_STATUS_REJECTED: &str = "REJECTED";

const JOB_STATUS_PENDING: &str = "PENDING";
const JOB_STATUS_UPLOADING: &str = "UPLOADING";
const JOB_STATUS_COMPLETED: &str = "COMPLETED";
const JOB_STATUS_FAILED: &str = "FAILED";

const JOB_TYPE_AUDIO: &str = "AUDIO";
const JOB_TYPE_COVER_ART: &str = "COVER_ART";

/// Database models for the ingestion pipeline
///
/// - Releases and tracks are the artist-facing records
/// - Upload jobs are queued units of "move this local file into durable
///   storage and attach its URL to an entity"
/// - Both background workers coordinate exclusively through these rows
///
/// Lifecycle of a release as owned by this crate:
/// DRAFT -> PROCESSING (submission, external) -> PENDING_REVIEW (processing
/// worker, once every track has audio) -> PUBLISHED / REJECTED (admin,
/// external).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    Draft,
    Processing,
    PendingReview,
    Published,
    Rejected,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Draft => RELEASE_STATUS_DRAFT,
            ReleaseStatus::Processing => RELEASE_STATUS_PROCESSING,
            ReleaseStatus::PendingReview => RELEASE_STATUS_PENDING_REVIEW,
            ReleaseStatus::Published => RELEASE_STATUS_PUBLISHED,
            ReleaseStatus::Rejected => RELEASE_STATUS_REJECTED,
        }
    }
}

/// Status of a queued upload job
///
/// PENDING jobs are eligible for the next poll. UPLOADING is transient and
/// only ever visible outside the upload transaction when something died
/// mid-flight; the stuck-job sweep reclaims those. FAILED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadJobStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadJobStatus::Pending => JOB_STATUS_PENDING,
            UploadJobStatus::Uploading => JOB_STATUS_UPLOADING,
            UploadJobStatus::Completed => JOB_STATUS_COMPLETED,
            UploadJobStatus::Failed => JOB_STATUS_FAILED,
        }
    }
}

/// What kind of file a job carries, and therefore which entity its URL
/// lands on: AUDIO -> track, COVER_ART -> release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadJobType {
    Audio,
    CoverArt,
}

impl UploadJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadJobType::Audio => JOB_TYPE_AUDIO,
            UploadJobType::CoverArt => JOB_TYPE_COVER_ART,
        }
    }
}

/// Release metadata - an artist's submission
///
/// cover_art_url is mutated only by the ingestion pipeline (or the
/// synchronous upload path), never by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbRelease {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    pub status: ReleaseStatus,
    pub cover_art_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbRelease {
    pub fn new(artist_id: &str, title: &str) -> Self {
        let now = Utc::now();
        DbRelease {
            id: Uuid::new_v4().to_string(),
            artist_id: artist_id.to_string(),
            title: title.to_string(),
            status: ReleaseStatus::Draft,
            cover_art_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Track metadata - belongs to exactly one release
///
/// audio_file_url is empty until an upload completes. duration_seconds
/// defaults to a minimal positive placeholder (the storage constraint
/// requires > 0) until real metadata is extracted from the uploaded audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbTrack {
    pub id: String,
    pub release_id: String,
    pub title: String,
    pub track_order: i32,
    pub isrc: Option<String>,
    pub audio_file_url: String,
    pub duration_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbTrack {
    pub fn new(release_id: &str, title: &str, track_order: i32) -> Self {
        let now = Utc::now();
        DbTrack {
            id: Uuid::new_v4().to_string(),
            release_id: release_id.to_string(),
            title: title.to_string(),
            track_order,
            isrc: None,
            audio_file_url: String::new(),
            duration_seconds: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A queued upload-and-attach operation
///
/// References its target entity by id only - a weak reference. The pipeline
/// does not verify the target still exists before writing; the gateway
/// surfaces a missing row as an error and the job fails through the normal
/// retry path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbUploadJob {
    pub id: String,
    pub target_entity_id: String,
    pub job_type: UploadJobType,
    pub local_path: String,
    pub status: UploadJobStatus,
    pub retry_count: i32,
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUploadJob {
    pub fn new(target_entity_id: &str, job_type: UploadJobType, local_path: &str) -> Self {
        let now = Utc::now();
        DbUploadJob {
            id: Uuid::new_v4().to_string(),
            target_entity_id: target_entity_id.to_string(),
            job_type,
            local_path: local_path.to_string(),
            status: UploadJobStatus::Pending,
            retry_count: 0,
            error_log: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A PROCESSING release joined with its track count, as read by the
/// processing worker's poll query.
#[derive(Debug, Clone)]
pub struct ProcessingRelease {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    pub track_count: i64,
}
