//! Analysis pipeline: orchestration, stages, review handling, and the
//! background workers that surround them.
//!
//! The orchestrator claims queued jobs and drives each one through its
//! variant's stage list; stages talk to the perception service through
//! the resilient caller and persist everything through the db crate.
//! Review corrections and stats recomputes run concurrently with
//! pipeline runs and only ever touch persisted rows.

pub mod blob;
pub mod error;
pub mod orchestrator;
pub mod recompute;
pub mod review;
pub mod stages;
pub mod upload_queue;

pub use blob::{BlobStore, FsBlobStore};
pub use error::PipelineError;
pub use orchestrator::{Orchestrator, PipelineContext};
pub use recompute::RecomputeWorker;
pub use upload_queue::{UploadQueue, UploadTask, UploadWorker};
