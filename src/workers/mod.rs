// # Background workers
//
// The asynchronous half of the ingestion pipeline:
//
// - **UploadWorker**: drains queued upload jobs, uploads to the object
//   store, attaches URLs to tracks/releases, retries with a bound, and
//   recovers jobs abandoned mid-flight
// - **ProcessingWorker**: advances releases out of PROCESSING once every
//   track has its audio
// - **WorkerSupervisor**: starts and stops both as a single unit
//
// The database is the only synchronization point between the two workers;
// neither holds in-memory state the other reads.

mod processing_worker;
mod supervisor;
mod upload_worker;

pub use processing_worker::{ProcessingWorker, ProcessingWorkerConfig};
pub use supervisor::WorkerSupervisor;
pub use upload_worker::{UploadWorker, UploadWorkerConfig};
