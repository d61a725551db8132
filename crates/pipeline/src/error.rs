//! Error type shared across the pipeline crate.

use matchlens_core::retry::CallError;
use matchlens_core::CoreError;

/// Failure of a pipeline operation.
///
/// The `Display` rendering of the stage-fatal variants becomes the
/// user-facing `error_message` on the job row, so messages stay concrete
/// about what failed rather than how it failed internally.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("perception service call failed: {0}")]
    Call(#[from] CallError),

    #[error("blob store error: {0}")]
    Blob(#[from] std::io::Error),

    #[error("{0}")]
    Stage(String),
}
