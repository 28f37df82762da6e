// Test support utilities for both unit and integration tests

use crate::cloud_storage::{CloudStorage, CloudStorageError};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mock cloud storage for testing
///
/// Stores objects in memory instead of uploading to S3 and issues
/// deterministic public URLs. Upload failures can be injected to exercise
/// the retry path, and deletions are recorded so best-effort cleanup is
/// observable.
pub struct MockCloudStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    fail_uploads: Mutex<usize>,
}

impl Default for MockCloudStorage {
    fn default() -> Self {
        MockCloudStorage {
            objects: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            fail_uploads: Mutex::new(0),
        }
    }
}

impl MockCloudStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` uploads fail with an injected storage error
    pub fn fail_next_uploads(&self, count: usize) {
        *self.fail_uploads.lock().unwrap() = count;
    }

    /// Number of objects currently stored
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Whether an object with this URL is currently stored
    pub fn contains_url(&self, url: &str) -> bool {
        self.objects.lock().unwrap().contains_key(url)
    }

    /// URLs deleted so far, in deletion order
    pub fn deleted_urls(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CloudStorage for MockCloudStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<String, CloudStorageError> {
        {
            let mut fail_uploads = self.fail_uploads.lock().unwrap();
            if *fail_uploads > 0 {
                *fail_uploads -= 1;
                return Err(CloudStorageError::SdkError(
                    "Injected upload failure".to_string(),
                ));
            }
        }

        let url = format!("https://test-bucket.s3.us-east-1.amazonaws.com/{}", key);
        self.objects
            .lock()
            .unwrap()
            .insert(url.clone(), data.to_vec());

        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), CloudStorageError> {
        self.objects.lock().unwrap().remove(url);
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
