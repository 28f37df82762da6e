#![cfg(feature = "test-utils")]

mod support;

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

use support::{
    create_test_release, create_test_track, setup_test_environment, test_wav_bytes,
    write_test_file,
};
use vwaza_ingest::db::{DbUploadJob, ReleaseStatus, UploadJobStatus, UploadJobType};
use vwaza_ingest::workers::{UploadWorker, UploadWorkerConfig};

fn test_config() -> UploadWorkerConfig {
    UploadWorkerConfig {
        poll_interval: Duration::from_millis(10),
        batch_size: 10,
        max_retries: 3,
        stuck_timeout: Duration::from_secs(5 * 60),
    }
}

#[tokio::test]
async fn successful_audio_job_attaches_url_and_duration() {
    let (db, storage, mock, temp_dir) = setup_test_environment().await;

    let release = create_test_release(ReleaseStatus::Processing);
    db.insert_release(&release).await.unwrap();
    let track = create_test_track(&release.id, 1);
    db.insert_track(&track).await.unwrap();

    let local_path = write_test_file(&temp_dir, "song.wav", &test_wav_bytes(2));
    let job = DbUploadJob::new(&track.id, UploadJobType::Audio, &local_path);
    db.insert_upload_job(&job).await.unwrap();

    let worker = UploadWorker::new(db.clone(), storage, test_config());
    worker.poll_and_dispatch().await.unwrap();

    let job = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, UploadJobStatus::Completed);
    assert_eq!(job.retry_count, 0);

    let track = db.get_track(&track.id).await.unwrap().unwrap();
    assert!(!track.audio_file_url.is_empty());
    assert!(mock.contains_url(&track.audio_file_url));
    assert_eq!(track.duration_seconds, 2);
}

#[tokio::test]
async fn cover_art_job_attaches_url_to_release() {
    let (db, storage, mock, temp_dir) = setup_test_environment().await;

    let release = create_test_release(ReleaseStatus::Draft);
    db.insert_release(&release).await.unwrap();

    let local_path = write_test_file(&temp_dir, "cover.jpg", b"fake image bytes");
    let job = DbUploadJob::new(&release.id, UploadJobType::CoverArt, &local_path);
    db.insert_upload_job(&job).await.unwrap();

    let worker = UploadWorker::new(db.clone(), storage, test_config());
    worker.poll_and_dispatch().await.unwrap();

    let job = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, UploadJobStatus::Completed);

    let release = db.get_release(&release.id).await.unwrap().unwrap();
    let url = release.cover_art_url.expect("cover art URL not set");
    assert!(mock.contains_url(&url));
}

#[tokio::test]
async fn failed_upload_requeues_with_incremented_retry() {
    let (db, storage, mock, temp_dir) = setup_test_environment().await;

    let release = create_test_release(ReleaseStatus::Processing);
    db.insert_release(&release).await.unwrap();
    let track = create_test_track(&release.id, 1);
    db.insert_track(&track).await.unwrap();

    let local_path = write_test_file(&temp_dir, "song.wav", &test_wav_bytes(1));
    let job = DbUploadJob::new(&track.id, UploadJobType::Audio, &local_path);
    db.insert_upload_job(&job).await.unwrap();

    mock.fail_next_uploads(1);

    let worker = UploadWorker::new(db.clone(), storage, test_config());
    worker.poll_and_dispatch().await.unwrap();

    let failed = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, UploadJobStatus::Pending);
    assert_eq!(failed.retry_count, 1);
    assert!(failed.error_log.unwrap().contains("Injected upload failure"));

    // The UPLOADING mark rolled back with the transaction: the entity is
    // untouched and no blob was stored.
    let track = db.get_track(&track.id).await.unwrap().unwrap();
    assert!(track.audio_file_url.is_empty());
    assert_eq!(mock.object_count(), 0);

    // Next tick succeeds and the retry count is preserved on completion.
    worker.poll_and_dispatch().await.unwrap();
    let completed = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(completed.status, UploadJobStatus::Completed);
    assert_eq!(completed.retry_count, 1);
}

#[tokio::test]
async fn retries_exhausted_marks_job_permanently_failed() {
    let (db, storage, _mock, temp_dir) = setup_test_environment().await;

    let release = create_test_release(ReleaseStatus::Processing);
    db.insert_release(&release).await.unwrap();
    let track = create_test_track(&release.id, 1);
    db.insert_track(&track).await.unwrap();

    // Missing local file: every attempt fails with an IO error.
    let missing_path = temp_dir.path().join("gone.mp3");
    let mut job = DbUploadJob::new(&track.id, UploadJobType::Audio, missing_path.to_str().unwrap());
    job.retry_count = 3;
    db.insert_upload_job(&job).await.unwrap();

    let worker = UploadWorker::new(db.clone(), storage, test_config());
    worker.poll_and_dispatch().await.unwrap();

    let failed = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, UploadJobStatus::Failed);
    assert_eq!(failed.retry_count, 3);
    assert!(failed.error_log.is_some());

    // FAILED is terminal: the job is never polled again.
    worker.poll_and_dispatch().await.unwrap();
    let still_failed = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(still_failed.status, UploadJobStatus::Failed);
    assert_eq!(still_failed.retry_count, 3);
}

#[tokio::test]
async fn retry_count_is_monotonic_across_failures() {
    let (db, storage, mock, temp_dir) = setup_test_environment().await;

    let release = create_test_release(ReleaseStatus::Processing);
    db.insert_release(&release).await.unwrap();
    let track = create_test_track(&release.id, 1);
    db.insert_track(&track).await.unwrap();

    let local_path = write_test_file(&temp_dir, "song.wav", &test_wav_bytes(1));
    let job = DbUploadJob::new(&track.id, UploadJobType::Audio, &local_path);
    db.insert_upload_job(&job).await.unwrap();

    mock.fail_next_uploads(4);
    let worker = UploadWorker::new(db.clone(), storage, test_config());

    let mut last_retry_count = 0;
    for _ in 0..4 {
        worker.poll_and_dispatch().await.unwrap();
        let current = db.get_upload_job(&job.id).await.unwrap().unwrap();
        assert!(current.retry_count >= last_retry_count);
        last_retry_count = current.retry_count;
    }

    let job = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, UploadJobStatus::Failed);
    assert_eq!(job.retry_count, 3);
}

#[tokio::test]
async fn missing_target_entity_rolls_back_and_cleans_up_blob() {
    let (db, storage, mock, temp_dir) = setup_test_environment().await;

    // The job references a track that no longer exists; the upload itself
    // succeeds but the entity write must fail and roll everything back.
    let local_path = write_test_file(&temp_dir, "song.wav", &test_wav_bytes(1));
    let job = DbUploadJob::new("deleted-track", UploadJobType::Audio, &local_path);
    db.insert_upload_job(&job).await.unwrap();

    let worker = UploadWorker::new(db.clone(), storage, test_config());
    worker.poll_and_dispatch().await.unwrap();

    let job = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, UploadJobStatus::Pending);
    assert_eq!(job.retry_count, 1);
    assert!(job.error_log.is_some());

    // Orphaned blob was removed best-effort.
    assert_eq!(mock.object_count(), 0);
    assert_eq!(mock.deleted_urls().len(), 1);
}

#[tokio::test]
async fn stuck_job_sweep_resets_exactly_once() {
    let (db, _storage, _mock, _temp_dir) = setup_test_environment().await;

    let mut job = DbUploadJob::new("track-1", UploadJobType::Audio, "/tmp/a.mp3");
    job.status = UploadJobStatus::Uploading;
    job.retry_count = 2;
    job.updated_at = Utc::now() - ChronoDuration::minutes(6);
    db.insert_upload_job(&job).await.unwrap();

    let reset = db
        .recover_stuck_jobs(ChronoDuration::minutes(5))
        .await
        .unwrap();
    assert_eq!(reset, vec![job.id.clone()]);

    let recovered = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(recovered.status, UploadJobStatus::Pending);
    assert_eq!(recovered.retry_count, 2);
    assert!(recovered.error_log.unwrap().contains("stuck"));

    // Idempotent: the job is PENDING now and a second sweep matches nothing.
    let reset_again = db
        .recover_stuck_jobs(ChronoDuration::minutes(5))
        .await
        .unwrap();
    assert!(reset_again.is_empty());
}

#[tokio::test]
async fn recently_updated_uploading_job_is_not_swept() {
    let (db, _storage, _mock, _temp_dir) = setup_test_environment().await;

    let mut job = DbUploadJob::new("track-1", UploadJobType::Audio, "/tmp/a.mp3");
    job.status = UploadJobStatus::Uploading;
    job.updated_at = Utc::now() - ChronoDuration::minutes(1);
    db.insert_upload_job(&job).await.unwrap();

    let reset = db
        .recover_stuck_jobs(ChronoDuration::minutes(5))
        .await
        .unwrap();
    assert!(reset.is_empty());

    let untouched = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, UploadJobStatus::Uploading);
}

#[tokio::test]
async fn swept_job_is_reprocessed_within_the_same_tick() {
    let (db, storage, _mock, temp_dir) = setup_test_environment().await;

    let release = create_test_release(ReleaseStatus::Processing);
    db.insert_release(&release).await.unwrap();
    let track = create_test_track(&release.id, 1);
    db.insert_track(&track).await.unwrap();

    let local_path = write_test_file(&temp_dir, "song.wav", &test_wav_bytes(1));
    let mut job = DbUploadJob::new(&track.id, UploadJobType::Audio, &local_path);
    job.status = UploadJobStatus::Uploading;
    job.updated_at = Utc::now() - ChronoDuration::minutes(10);
    db.insert_upload_job(&job).await.unwrap();

    // The sweep runs before dispatch, so the reclaimed job completes in the
    // same tick with its retry count intact.
    let worker = UploadWorker::new(db.clone(), storage, test_config());
    worker.poll_and_dispatch().await.unwrap();

    let job = db.get_upload_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, UploadJobStatus::Completed);
    assert_eq!(job.retry_count, 0);
}

#[tokio::test]
async fn pending_jobs_are_drained_oldest_first() {
    let (db, _storage, _mock, _temp_dir) = setup_test_environment().await;

    let mut newer = DbUploadJob::new("track-b", UploadJobType::Audio, "/tmp/b.mp3");
    newer.created_at = Utc::now();
    let mut older = DbUploadJob::new("track-a", UploadJobType::Audio, "/tmp/a.mp3");
    older.created_at = Utc::now() - ChronoDuration::seconds(30);

    db.insert_upload_job(&newer).await.unwrap();
    db.insert_upload_job(&older).await.unwrap();

    let jobs = db.find_pending_jobs(10).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, older.id);
    assert_eq!(jobs[1].id, newer.id);

    let limited = db.find_pending_jobs(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, older.id);
}
