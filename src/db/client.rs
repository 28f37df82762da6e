use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;

use crate::db::models::*;

// String constants for SQL DEFAULT clauses (keep in sync with as_str())
const JOB_STATUS_PENDING: &str = "PENDING";

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);
        let pool = SqlitePool::connect(&database_url).await?;

        let db = Database { pool };
        db.create_tables().await?;
        Ok(db)
    }

    /// Underlying pool, for callers that open their own transactions
    /// (the upload worker and the synchronous upload path).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create all necessary tables
    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        // Releases table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS releases (
                id TEXT PRIMARY KEY,
                artist_id TEXT NOT NULL,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                cover_art_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Tracks table
        // duration_seconds must stay positive; new tracks carry a 1s
        // placeholder until ingestion extracts the real duration.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                release_id TEXT NOT NULL,
                title TEXT NOT NULL,
                track_order INTEGER NOT NULL,
                isrc TEXT,
                audio_file_url TEXT NOT NULL DEFAULT '',
                duration_seconds INTEGER NOT NULL DEFAULT 1 CHECK (duration_seconds > 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (release_id) REFERENCES releases (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Upload jobs table
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS upload_jobs (
                id TEXT PRIMARY KEY,
                target_entity_id TEXT NOT NULL,
                job_type TEXT NOT NULL,
                local_path TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT '{}',
                retry_count INTEGER NOT NULL DEFAULT 0,
                error_log TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            JOB_STATUS_PENDING
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- Releases ---

    /// Insert a new release
    pub async fn insert_release(&self, release: &DbRelease) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO releases (
                id, artist_id, title, status, cover_art_url, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&release.id)
        .bind(&release.artist_id)
        .bind(&release.title)
        .bind(release.status)
        .bind(&release.cover_art_url)
        .bind(release.created_at.to_rfc3339())
        .bind(release.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a release by ID
    pub async fn get_release(&self, release_id: &str) -> Result<Option<DbRelease>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM releases WHERE id = ?")
            .bind(release_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| map_release(&row)))
    }

    /// Update a release's status
    pub async fn update_release_status(
        &self,
        release_id: &str,
        status: ReleaseStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE releases SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now().to_rfc3339())
            .bind(release_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Find all releases currently in PROCESSING, joined with their track
    /// counts. Drives the processing worker's poll cycle.
    pub async fn find_processing_releases(&self) -> Result<Vec<ProcessingRelease>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.artist_id, r.title, COUNT(t.id) AS track_count
            FROM releases r
            LEFT JOIN tracks t ON t.release_id = r.id
            WHERE r.status = ?
            GROUP BY r.id, r.artist_id, r.title
            "#,
        )
        .bind(ReleaseStatus::Processing)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ProcessingRelease {
                id: row.get("id"),
                artist_id: row.get("artist_id"),
                title: row.get("title"),
                track_count: row.get("track_count"),
            })
            .collect())
    }

    // --- Tracks ---

    /// Insert a new track
    pub async fn insert_track(&self, track: &DbTrack) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tracks (
                id, release_id, title, track_order, isrc,
                audio_file_url, duration_seconds, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&track.id)
        .bind(&track.release_id)
        .bind(&track.title)
        .bind(track.track_order)
        .bind(&track.isrc)
        .bind(&track.audio_file_url)
        .bind(track.duration_seconds)
        .bind(track.created_at.to_rfc3339())
        .bind(track.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a track by ID
    pub async fn get_track(&self, track_id: &str) -> Result<Option<DbTrack>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM tracks WHERE id = ?")
            .bind(track_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| map_track(&row)))
    }

    /// List all tracks of a release in track order
    pub async fn list_tracks(&self, release_id: &str) -> Result<Vec<DbTrack>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM tracks WHERE release_id = ? ORDER BY track_order ASC")
            .bind(release_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_track).collect())
    }

    /// Count a release's tracks that have a non-empty audio URL
    /// (the numerator of the completion predicate).
    pub async fn count_completed_tracks(&self, release_id: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM tracks WHERE release_id = ? AND audio_file_url != ''",
        )
        .bind(release_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("count"))
    }

    /// Write an uploaded audio URL (and extracted duration, when present)
    /// onto a track, inside the caller's transaction.
    ///
    /// Returns RowNotFound if the track was deleted between job creation and
    /// processing, so the caller's transaction rolls back and the job fails
    /// through the normal retry path.
    pub async fn set_track_audio_tx(
        &self,
        tx: &mut SqliteConnection,
        track_id: &str,
        url: &str,
        duration_seconds: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        let result = match duration_seconds {
            Some(duration) => {
                sqlx::query(
                    r#"
                    UPDATE tracks SET audio_file_url = ?, duration_seconds = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(url)
                .bind(duration)
                .bind(Utc::now().to_rfc3339())
                .bind(track_id)
                .execute(&mut *tx)
                .await?
            }
            None => {
                sqlx::query("UPDATE tracks SET audio_file_url = ?, updated_at = ? WHERE id = ?")
                    .bind(url)
                    .bind(Utc::now().to_rfc3339())
                    .bind(track_id)
                    .execute(&mut *tx)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Write an uploaded cover art URL onto a release, inside the caller's
    /// transaction. Returns RowNotFound if the release no longer exists.
    pub async fn set_release_cover_art_tx(
        &self,
        tx: &mut SqliteConnection,
        release_id: &str,
        url: &str,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query("UPDATE releases SET cover_art_url = ?, updated_at = ? WHERE id = ?")
            .bind(url)
            .bind(Utc::now().to_rfc3339())
            .bind(release_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    // --- Upload jobs ---

    /// Insert a new upload job
    pub async fn insert_upload_job(&self, job: &DbUploadJob) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO upload_jobs (
                id, target_entity_id, job_type, local_path, status,
                retry_count, error_log, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.target_entity_id)
        .bind(job.job_type)
        .bind(&job.local_path)
        .bind(job.status)
        .bind(job.retry_count)
        .bind(&job.error_log)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an upload job by ID
    pub async fn get_upload_job(&self, job_id: &str) -> Result<Option<DbUploadJob>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM upload_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| map_upload_job(&row)))
    }

    /// Fetch up to `limit` PENDING jobs, oldest first (FIFO fairness)
    pub async fn find_pending_jobs(&self, limit: i64) -> Result<Vec<DbUploadJob>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM upload_jobs
            WHERE status = ?
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(UploadJobStatus::Pending)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_upload_job).collect())
    }

    /// Mark a job UPLOADING inside the caller's transaction. Rolls back with
    /// everything else if the upload fails, so a failed job only re-enters
    /// PENDING through the explicit failure handler.
    pub async fn mark_job_uploading_tx(
        &self,
        tx: &mut SqliteConnection,
        job_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE upload_jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(UploadJobStatus::Uploading)
            .bind(Utc::now().to_rfc3339())
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        Ok(())
    }

    /// Mark a job COMPLETED inside the caller's transaction
    pub async fn complete_job_tx(
        &self,
        tx: &mut SqliteConnection,
        job_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE upload_jobs SET status = ?, error_log = NULL, updated_at = ? WHERE id = ?")
            .bind(UploadJobStatus::Completed)
            .bind(Utc::now().to_rfc3339())
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        Ok(())
    }

    /// Record a job failure as its own statement, outside any transaction.
    /// Used for both the retry path (PENDING, retry_count + 1) and the
    /// terminal path (FAILED), so the bookkeeping always lands even though
    /// the upload transaction rolled back.
    pub async fn mark_job_failure(
        &self,
        job_id: &str,
        status: UploadJobStatus,
        retry_count: i32,
        error_log: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE upload_jobs SET status = ?, retry_count = ?, error_log = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(retry_count)
        .bind(error_log)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reset jobs stuck in UPLOADING for longer than `stuck_timeout` back to
    /// PENDING, leaving retry_count untouched. Returns the ids that were
    /// reset. Idempotent under repeated sweeps: a reset job is PENDING and no
    /// longer matches.
    pub async fn recover_stuck_jobs(
        &self,
        stuck_timeout: Duration,
    ) -> Result<Vec<String>, sqlx::Error> {
        let cutoff = Utc::now() - stuck_timeout;
        let rows = sqlx::query(
            r#"
            UPDATE upload_jobs
            SET status = ?, error_log = ?, updated_at = ?
            WHERE status = ? AND updated_at < ?
            RETURNING id
            "#,
        )
        .bind(UploadJobStatus::Pending)
        .bind("Job was stuck in UPLOADING and has been reset by the recovery sweep")
        .bind(Utc::now().to_rfc3339())
        .bind(UploadJobStatus::Uploading)
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

fn map_release(row: &SqliteRow) -> DbRelease {
    DbRelease {
        id: row.get("id"),
        artist_id: row.get("artist_id"),
        title: row.get("title"),
        status: row.get("status"),
        cover_art_url: row.get("cover_art_url"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at")),
    }
}

fn map_track(row: &SqliteRow) -> DbTrack {
    DbTrack {
        id: row.get("id"),
        release_id: row.get("release_id"),
        title: row.get("title"),
        track_order: row.get("track_order"),
        isrc: row.get("isrc"),
        audio_file_url: row.get("audio_file_url"),
        duration_seconds: row.get("duration_seconds"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at")),
    }
}

fn map_upload_job(row: &SqliteRow) -> DbUploadJob {
    DbUploadJob {
        id: row.get("id"),
        target_entity_id: row.get("target_entity_id"),
        job_type: row.get("job_type"),
        local_path: row.get("local_path"),
        status: row.get("status"),
        retry_count: row.get("retry_count"),
        error_log: row.get("error_log"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at")),
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}
