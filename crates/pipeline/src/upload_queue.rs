//! Serialized video-half uploads into the blob store.
//!
//! Registering a video is a two-step handoff: the API handler enqueues an
//! [`UploadTask`] pointing at the staged upload file, and the single
//! [`UploadWorker`] moves the bytes into the blob store, records the path
//! on the match row, and queues the analysis job. One worker means half
//! uploads for the same match can never interleave their writes.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use matchlens_core::job::{Half, PipelineVariant};
use matchlens_core::storage;
use matchlens_core::types::DbId;
use matchlens_db::repositories::{JobRepo, MatchRepo};
use matchlens_db::DbPool;
use matchlens_events::{AnalysisEvent, EventBus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::blob::BlobStore;
use crate::error::PipelineError;

/// How often the worker checks for queued uploads.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One staged video half awaiting ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub match_id: DbId,
    pub half: Half,
    /// Absolute path of the staged upload on local disk.
    pub source_path: PathBuf,
}

/// FIFO queue of staged uploads, shared between the API and the worker.
#[derive(Default)]
pub struct UploadQueue {
    inner: Mutex<VecDeque<UploadTask>>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, task: UploadTask) {
        self.lock().push_back(task);
    }

    /// Pop the oldest task, if any.
    pub fn claim(&self) -> Option<UploadTask> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<UploadTask>> {
        // A poisoned queue mutex only means a panicking thread died while
        // holding it; the VecDeque itself is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Background worker draining the upload queue.
pub struct UploadWorker {
    pool: DbPool,
    queue: Arc<UploadQueue>,
    blob: Arc<dyn BlobStore>,
    bus: Arc<EventBus>,
    variant: PipelineVariant,
}

impl UploadWorker {
    pub fn new(
        pool: DbPool,
        queue: Arc<UploadQueue>,
        blob: Arc<dyn BlobStore>,
        bus: Arc<EventBus>,
        variant: PipelineVariant,
    ) -> Self {
        Self {
            pool,
            queue,
            blob,
            bus,
            variant,
        }
    }

    /// Drain the queue until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("upload worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(pending = self.queue.len(), "upload worker stopping");
                    return;
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    while let Some(task) = self.queue.claim() {
                        if let Err(e) = self.ingest(&task).await {
                            tracing::error!(
                                match_id = task.match_id,
                                half = task.half.as_str(),
                                error = %e,
                                "video ingestion failed, dropping upload"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Move one staged video into the blob store and queue its analysis.
    async fn ingest(&self, task: &UploadTask) -> Result<(), PipelineError> {
        let bytes = tokio::fs::read(&task.source_path).await?;
        let blob_path = storage::video_path(task.match_id, task.half);
        self.blob.put(&blob_path, &bytes).await?;

        MatchRepo::set_video_path(&self.pool, task.match_id, task.half, &blob_path).await?;

        // The staged copy is no longer needed once the blob is durable.
        if let Err(e) = tokio::fs::remove_file(&task.source_path).await {
            tracing::warn!(path = %task.source_path.display(), error = %e, "staged upload not removed");
        }

        let job = JobRepo::create(&self.pool, task.match_id, task.half, self.variant).await?;
        self.bus.publish(
            AnalysisEvent::new("job.queued", task.match_id)
                .with_job(job.id)
                .with_payload(serde_json::json!({ "half": task.half.as_str() })),
        );

        tracing::info!(
            match_id = task.match_id,
            half = task.half.as_str(),
            job_id = job.id,
            "video registered and analysis queued"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn task(match_id: DbId, half: Half) -> UploadTask {
        UploadTask {
            match_id,
            half,
            source_path: PathBuf::from(format!("/tmp/staged_{match_id}_{}", half.as_str())),
        }
    }

    #[test]
    fn queue_is_fifo() {
        let queue = UploadQueue::new();
        queue.enqueue(task(1, Half::First));
        queue.enqueue(task(1, Half::Second));
        queue.enqueue(task(2, Half::Full));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.claim(), Some(task(1, Half::First)));
        assert_eq!(queue.claim(), Some(task(1, Half::Second)));
        assert_eq!(queue.claim(), Some(task(2, Half::Full)));
        assert_eq!(queue.claim(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn claim_on_empty_queue_is_none() {
        let queue = UploadQueue::new();
        assert_eq!(queue.claim(), None);
    }
}
