//! Job claim loop and per-job execution driver.
//!
//! One orchestrator polls for queued jobs and spawns an independent task
//! per claim, so jobs for different matches run fully in parallel while
//! all cross-task state stays in Postgres and on the event bus. Within a
//! job, stages run strictly sequentially; cancellation is honored only
//! between stages so started external calls always complete.

use std::sync::Arc;
use std::time::{Duration, Instant};

use matchlens_core::job::{combined_status, Half, JobStatus, MatchFormat};
use matchlens_core::retry::RetryConfig;
use matchlens_db::models::job::AnalysisJob;
use matchlens_db::repositories::{JobRepo, StageTimingRepo};
use matchlens_db::DbPool;
use matchlens_events::{AnalysisEvent, EventBus};
use matchlens_vision::VisionClient;
use tokio_util::sync::CancellationToken;

use crate::blob::BlobStore;
use crate::error::PipelineError;
use crate::stages::StageRunner;

/// How often the claim loop checks for queued jobs.
const CLAIM_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shared handles every pipeline worker needs.
#[derive(Clone)]
pub struct PipelineContext {
    pub pool: DbPool,
    pub bus: Arc<EventBus>,
    pub vision: VisionClient,
    pub blob: Arc<dyn BlobStore>,
    pub retry: RetryConfig,
    /// Concurrent work units per stage (windows, tracks).
    pub worker_limit: usize,
}

/// Claims queued analysis jobs and runs them to a terminal status.
pub struct Orchestrator {
    ctx: PipelineContext,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Poll-and-dispatch until cancelled. Already-claimed jobs keep
    /// running past cancellation up to their next stage boundary.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("pipeline orchestrator started");
        let mut tick = tokio::time::interval(CLAIM_POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("pipeline orchestrator stopping");
                    return;
                }
                _ = tick.tick() => {
                    match JobRepo::claim_next_queued(&self.ctx.pool).await {
                        Ok(Some(job)) => {
                            self.dispatch(job, shutdown.clone());
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "job claim query failed");
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, job: AnalysisJob, shutdown: CancellationToken) {
        tracing::info!(
            job_id = job.id,
            match_id = job.match_id,
            half = %job.half,
            variant = %job.variant,
            "claimed analysis job"
        );
        self.ctx.bus.publish(
            AnalysisEvent::new("job.running", job.match_id)
                .with_job(job.id)
                .with_payload(serde_json::json!({ "half": job.half })),
        );

        let ctx = self.ctx.clone();
        tokio::spawn(run_job(ctx, job, shutdown));
    }
}

/// Run one claimed job to a terminal status.
///
/// Any error short of marking the row is converted into a job-level
/// error with a user-facing message; artifacts from completed stages are
/// never rolled back.
pub async fn run_job(ctx: PipelineContext, job: AnalysisJob, shutdown: CancellationToken) {
    let job_id = job.id;
    let match_id = job.match_id;

    if let Err(e) = execute(ctx.clone(), job, &shutdown).await {
        let message = e.to_string();
        tracing::error!(job_id, match_id, error = %message, "analysis job failed");
        if let Err(db_err) = JobRepo::mark_error(&ctx.pool, job_id, &message).await {
            tracing::error!(job_id, error = %db_err, "failed to record job error");
        }
        ctx.bus.publish(
            AnalysisEvent::new("job.error", match_id)
                .with_job(job_id)
                .with_payload(serde_json::json!({ "message": message })),
        );
    }
}

async fn execute(
    ctx: PipelineContext,
    job: AnalysisJob,
    shutdown: &CancellationToken,
) -> Result<(), PipelineError> {
    let mut runner = StageRunner::new(ctx.clone(), job).await?;

    for &stage in runner.variant.stages() {
        if shutdown.is_cancelled() {
            return Err(PipelineError::Stage(
                "analysis interrupted by shutdown".into(),
            ));
        }

        runner.progress(stage, 0.0).await?;
        let started = Instant::now();
        runner.run_stage(stage).await?;
        let elapsed = started.elapsed().as_secs_f64();

        // Timing history only feeds estimates; losing a sample is fine.
        if let Err(e) = StageTimingRepo::record(&ctx.pool, stage, elapsed).await {
            tracing::warn!(stage = stage.as_str(), error = %e, "stage timing not recorded");
        }
        runner.progress(stage, 1.0).await?;

        tracing::info!(
            job_id = runner.job.id,
            stage = stage.as_str(),
            elapsed_secs = elapsed,
            "stage complete"
        );
    }

    JobRepo::mark_done(&ctx.pool, runner.job.id).await?;
    publish_terminal(&ctx, &runner).await?;
    Ok(())
}

/// Publish the job's terminal event, rolled up across both halves for
/// two-half matches (`job.partial` while the other half lags).
async fn publish_terminal(ctx: &PipelineContext, runner: &StageRunner) -> Result<(), PipelineError> {
    let match_id = runner.job.match_id;

    let combined = match runner.match_row.match_format()? {
        MatchFormat::SingleVideo => JobStatus::Done,
        MatchFormat::TwoHalves => {
            let first = half_status(&ctx.pool, match_id, Half::First).await?;
            let second = half_status(&ctx.pool, match_id, Half::Second).await?;
            combined_status(first, second)
        }
    };

    let event_type = if combined == JobStatus::Partial {
        "job.partial"
    } else {
        "job.done"
    };
    ctx.bus.publish(
        AnalysisEvent::new(event_type, match_id)
            .with_job(runner.job.id)
            .with_payload(serde_json::json!({
                "half": runner.half.as_str(),
                "combined_status": combined.as_str(),
            })),
    );
    Ok(())
}

async fn half_status(
    pool: &DbPool,
    match_id: i64,
    half: Half,
) -> Result<Option<JobStatus>, PipelineError> {
    let job = JobRepo::latest_for_half(pool, match_id, half).await?;
    match job {
        Some(j) => Ok(Some(j.job_status()?)),
        None => Ok(None),
    }
}
