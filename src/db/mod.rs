mod client;
mod models;

pub use client::Database;
pub use models::{
    DbRelease, DbTrack, DbUploadJob, ProcessingRelease, ReleaseStatus, UploadJobStatus,
    UploadJobType,
};
