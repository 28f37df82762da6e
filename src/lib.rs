// Library exports for integration tests and reusable components

pub mod audio_metadata;
pub mod cloud_storage;
pub mod config;
pub mod db;
pub mod upload;
pub mod workers;

// Test support (only available with test-utils feature)
#[cfg(feature = "test-utils")]
pub mod test_support;
