use std::sync::Arc;

use tempfile::TempDir;

use vwaza_ingest::cloud_storage::CloudStorageManager;
use vwaza_ingest::db::{Database, DbRelease, DbTrack, ReleaseStatus};
use vwaza_ingest::test_support::MockCloudStorage;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Fresh SQLite database plus mock-backed cloud storage in a temp dir
pub async fn setup_test_environment() -> (
    Database,
    CloudStorageManager,
    Arc<MockCloudStorage>,
    TempDir,
) {
    tracing_init();

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let database = Database::new(db_path.to_str().unwrap())
        .await
        .expect("Failed to create database");

    let mock_storage = Arc::new(MockCloudStorage::new());
    let cloud_storage = CloudStorageManager::from_storage(mock_storage.clone());

    (database, cloud_storage, mock_storage, temp_dir)
}

pub fn create_test_release(status: ReleaseStatus) -> DbRelease {
    let mut release = DbRelease::new("artist-1", "Test Release");
    release.status = status;
    release
}

pub fn create_test_track(release_id: &str, track_order: i32) -> DbTrack {
    DbTrack::new(release_id, "Test Track", track_order)
}

/// Write a file into the temp dir and return its path as a string
pub fn write_test_file(temp_dir: &TempDir, name: &str, contents: &[u8]) -> String {
    let path = temp_dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

/// Minimal valid PCM WAV file of the given duration (8kHz mono 16-bit),
/// silence throughout. Enough for real duration extraction in tests.
pub fn test_wav_bytes(seconds: u32) -> Vec<u8> {
    let sample_rate: u32 = 8000;
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let data_len = sample_rate * seconds * (bits_per_sample as u32 / 8) * channels as u32;

    let mut buf = Vec::with_capacity(44 + data_len as usize);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    let block_align = channels * (bits_per_sample / 8);
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    buf.resize(44 + data_len as usize, 0);
    buf
}
