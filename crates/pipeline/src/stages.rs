//! The pipeline stages and the per-job state threaded between them.
//!
//! Stage N consumes stage N-1's persisted output (plus a small in-memory
//! carry in [`RunState`]); per-unit work inside a stage fans out under a
//! semaphore-bounded `JoinSet`, each unit independently wrapped by the
//! resilient caller so one unit's retries never block its siblings.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use matchlens_core::dedup::merge_events;
use matchlens_core::error_debounce::{DebounceState, ErrorDebounce};
use matchlens_core::event::MatchEvent;
use matchlens_core::identity;
use matchlens_core::job::{Half, PipelineStage, PipelineVariant};
use matchlens_core::progress::{estimate_remaining_secs, overall_progress, StageHistory};
use matchlens_core::ranking::{rank_clips, Clip, RankContext};
use matchlens_core::retry::{call_with_retry_hook, CallError, RetryConfig};
use matchlens_core::stats::{self, goal_differential};
use matchlens_core::storage;
use matchlens_core::track::{summarize_frames, TrackFrame};
use matchlens_core::CoreError;
use matchlens_db::models::clip::NewClip;
use matchlens_db::models::event::NewEvent;
use matchlens_db::models::job::AnalysisJob;
use matchlens_db::models::mapping::UpsertMapping;
use matchlens_db::models::matches::Match;
use matchlens_db::models::track::NewTrack;
use matchlens_db::repositories::{
    ClipRepo, EventRepo, JobRepo, MappingRepo, MatchRepo, MetricRepo, ReviewRepo, TrackRepo,
};
use matchlens_db::repositories::StageTimingRepo;
use matchlens_db::DbPool;
use matchlens_events::AnalysisEvent;
use matchlens_vision::{split_windows, TrackingStatus};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::PipelineError;
use crate::orchestrator::PipelineContext;

/// Detected events below this confidence are flagged for human review.
pub const EVENT_REVIEW_THRESHOLD: f64 = 0.5;

/// Interval between polls of an asynchronous tracking job.
const TRACK_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Regulation first-half length; offsets second-half video time into
/// whole-match time for the ranker.
const SECOND_HALF_OFFSET_SECS: f64 = 45.0 * 60.0;

// ---------------------------------------------------------------------------
// Resilience
// ---------------------------------------------------------------------------

/// Per-job wrapper around the resilient caller, feeding the transient
/// error debouncer and surfacing confirmed errors onto the job row.
pub(crate) struct Resilience {
    pool: DbPool,
    job_id: i64,
    retry: RetryConfig,
    debounce: Mutex<ErrorDebounce>,
    surfaced: AtomicBool,
}

impl Resilience {
    fn new(pool: DbPool, job_id: i64, retry: RetryConfig) -> Self {
        Self {
            pool,
            job_id,
            retry,
            debounce: Mutex::new(ErrorDebounce::new()),
            surfaced: AtomicBool::new(false),
        }
    }

    fn debounce(&self) -> std::sync::MutexGuard<'_, ErrorDebounce> {
        self.debounce.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `op` under the retry policy, recording every failure into the
    /// debouncer. A confirmed failure streak writes the job's transient
    /// `error_message`; the next success clears it.
    pub(crate) async fn call<T, F, Fut>(&self, op_name: &str, op: F) -> Result<T, CallError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let result = call_with_retry_hook(&self.retry, op_name, op, |_, _| {
            self.debounce().record_failure(Utc::now());
        })
        .await;

        match &result {
            Ok(_) => {
                self.debounce().record_success();
                if self.surfaced.swap(false, Ordering::SeqCst) {
                    if let Err(e) = JobRepo::set_error_message(&self.pool, self.job_id, None).await
                    {
                        tracing::warn!(job_id = self.job_id, error = %e, "error message not cleared");
                    }
                }
            }
            Err(err) => {
                let state = self.debounce().record_failure(Utc::now());
                if state == DebounceState::Confirmed
                    && !self.surfaced.swap(true, Ordering::SeqCst)
                {
                    let message = err.to_string();
                    if let Err(e) =
                        JobRepo::set_error_message(&self.pool, self.job_id, Some(&message)).await
                    {
                        tracing::warn!(job_id = self.job_id, error = %e, "error message not recorded");
                    }
                }
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// In-memory carry between stages of one run. Everything here is also
/// persisted by the stage that produced it; this only saves re-reads.
#[derive(Default)]
struct RunState {
    video_path: String,
    duration_secs: f64,
    events: Vec<MatchEvent>,
    clips: Vec<Clip>,
}

// ---------------------------------------------------------------------------
// StageRunner
// ---------------------------------------------------------------------------

/// Drives the stages of one claimed job.
pub struct StageRunner {
    ctx: PipelineContext,
    pub job: AnalysisJob,
    pub match_row: Match,
    pub half: Half,
    pub variant: PipelineVariant,
    history: HashMap<PipelineStage, StageHistory>,
    resilience: Arc<Resilience>,
    state: RunState,
}

impl StageRunner {
    /// Load everything a run needs up front; fails fast on rows with
    /// unparseable enum strings.
    pub async fn new(ctx: PipelineContext, job: AnalysisJob) -> Result<Self, PipelineError> {
        let half = job.job_half()?;
        let variant = job.pipeline_variant()?;
        let match_row = MatchRepo::find_by_id(&ctx.pool, job.match_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "match",
                id: job.match_id,
            })?;
        let history = StageTimingRepo::get_all(&ctx.pool).await?;
        let resilience = Arc::new(Resilience::new(ctx.pool.clone(), job.id, ctx.retry.clone()));

        Ok(Self {
            ctx,
            job,
            match_row,
            half,
            variant,
            history,
            resilience,
            state: RunState::default(),
        })
    }

    /// Persist the progress surface for `stage` at `fraction` complete.
    pub async fn progress(&self, stage: PipelineStage, fraction: f64) -> Result<(), PipelineError> {
        let overall = overall_progress(self.variant, stage, fraction);
        let eta = estimate_remaining_secs(self.variant, stage, fraction, &self.history);
        JobRepo::update_progress(&self.ctx.pool, self.job.id, stage, overall, eta).await?;
        Ok(())
    }

    pub async fn run_stage(&mut self, stage: PipelineStage) -> Result<(), PipelineError> {
        match stage {
            PipelineStage::Prepare => self.prepare().await,
            PipelineStage::Track => self.track().await,
            PipelineStage::LabelWindows => self.label_windows().await,
            PipelineStage::Analyze => self.analyze().await,
            PipelineStage::MergeRank => self.merge_rank().await,
            PipelineStage::Identify => self.identify().await,
            PipelineStage::Aggregate => self.aggregate().await,
        }
    }

    // -- Prepare ------------------------------------------------------------

    /// Check the registered video blob is actually there.
    async fn prepare(&mut self) -> Result<(), PipelineError> {
        let path = self
            .match_row
            .video_path(self.half)
            .ok_or_else(|| {
                PipelineError::Stage(format!(
                    "no video registered for the {} half",
                    self.half.as_str()
                ))
            })?
            .to_string();

        if !self.ctx.blob.exists(&path).await? {
            return Err(PipelineError::Stage(format!(
                "registered video blob is missing: {path}"
            )));
        }
        self.state.video_path = path;
        Ok(())
    }

    // -- Track --------------------------------------------------------------

    /// Submit the half to the tracking endpoint and poll to completion.
    async fn track(&mut self) -> Result<(), PipelineError> {
        let vision = self.ctx.vision.clone();
        let video_path = self.state.video_path.clone();

        let remote_id = self
            .resilience
            .call("vision.track.submit", move |_| {
                let vision = vision.clone();
                let video_path = video_path.clone();
                async move { vision.submit_tracking(&video_path).await }
            })
            .await?;

        loop {
            tokio::time::sleep(TRACK_POLL_INTERVAL).await;

            let vision = self.ctx.vision.clone();
            let remote = remote_id.clone();
            let poll = self
                .resilience
                .call("vision.track.poll", move |_| {
                    let vision = vision.clone();
                    let remote = remote.clone();
                    async move { vision.poll_tracking(&remote).await }
                })
                .await?;

            if let Some(duration) = poll.duration_secs {
                self.state.duration_secs = duration;
            }

            match poll.status {
                TrackingStatus::Processing => {
                    self.progress(PipelineStage::Track, poll.progress).await?;
                }
                TrackingStatus::Error => {
                    return Err(PipelineError::Stage(format!(
                        "tracking failed: {}",
                        poll.error.unwrap_or_else(|| "unknown error".into())
                    )));
                }
                TrackingStatus::Completed => {
                    return self.persist_tracks(poll.tracks).await;
                }
            }
        }
    }

    async fn persist_tracks(
        &mut self,
        raw: Vec<matchlens_vision::RawTrack>,
    ) -> Result<(), PipelineError> {
        let frames_path = storage::tracking_result_path(self.job.match_id, self.half);

        let mut document: BTreeMap<String, Vec<TrackFrame>> = BTreeMap::new();
        let mut new_tracks = Vec::with_capacity(raw.len());
        for track in &raw {
            let key = track.track_key();
            let frames = track.to_frames();
            let summary = summarize_frames(&key, &frames)?;
            if self.state.duration_secs < summary.end_secs {
                self.state.duration_secs = summary.end_secs;
            }
            new_tracks.push(NewTrack {
                summary,
                frames_path: frames_path.clone(),
            });
            document.insert(key, frames);
        }

        let bytes = serde_json::to_vec(&document)
            .map_err(|e| CoreError::Internal(format!("tracking document serialization: {e}")))?;
        self.ctx.blob.put(&frames_path, &bytes).await?;

        TrackRepo::insert_many(
            &self.ctx.pool,
            self.job.match_id,
            self.job.id,
            self.half,
            &new_tracks,
        )
        .await?;

        tracing::info!(
            job_id = self.job.id,
            tracks = new_tracks.len(),
            "tracking complete"
        );
        Ok(())
    }

    // -- LabelWindows -------------------------------------------------------

    /// Label overlapping windows concurrently, bounded by the worker
    /// limit.
    async fn label_windows(&mut self) -> Result<(), PipelineError> {
        let windows = split_windows(self.state.duration_secs);
        if windows.is_empty() {
            return Err(PipelineError::Stage(
                "video duration unknown, cannot split label windows".into(),
            ));
        }
        let total = windows.len();

        let semaphore = Arc::new(Semaphore::new(self.ctx.worker_limit));
        let mut tasks: JoinSet<Result<(u32, matchlens_vision::LabelResponse), CallError>> =
            JoinSet::new();

        for window in windows {
            let semaphore = semaphore.clone();
            let resilience = self.resilience.clone();
            let vision = self.ctx.vision.clone();
            let video_path = self.state.video_path.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| CallError::Network("stage worker pool closed".into()))?;
                let response = resilience
                    .call("vision.label_window", move |_| {
                        let vision = vision.clone();
                        let video_path = video_path.clone();
                        async move { vision.label_window(&video_path, window).await }
                    })
                    .await?;
                Ok((window.id, response))
            });
        }

        let mut done = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (window_id, response) = joined
                .map_err(|e| PipelineError::Stage(format!("label window task failed: {e}")))??;

            for raw in response.events {
                self.state.events.push(raw.into_event(Some(window_id)));
            }
            for scene in response.scenes {
                self.state.clips.push(scene.into_clip());
            }

            done += 1;
            self.progress(PipelineStage::LabelWindows, done as f64 / total as f64)
                .await?;
        }
        Ok(())
    }

    // -- Analyze (consolidated) ----------------------------------------------

    /// Single consolidated labeling pass; persists its results directly
    /// since this variant has no separate merge stage.
    async fn analyze(&mut self) -> Result<(), PipelineError> {
        let vision = self.ctx.vision.clone();
        let video_path = self.state.video_path.clone();

        let response = self
            .resilience
            .call("vision.analyze", move |_| {
                let vision = vision.clone();
                let video_path = video_path.clone();
                async move { vision.analyze(&video_path).await }
            })
            .await?;

        for raw in response.events {
            let event = raw.into_event(None);
            if self.state.duration_secs < event.event_secs {
                self.state.duration_secs = event.event_secs;
            }
            self.state.events.push(event);
        }
        self.state.clips = response.scenes.into_iter().map(|s| s.into_clip()).collect();

        self.condense_and_persist().await
    }

    // -- MergeRank (windowed) -------------------------------------------------

    async fn merge_rank(&mut self) -> Result<(), PipelineError> {
        self.condense_and_persist().await
    }

    /// Merge duplicate sightings, rank clips against the merged events,
    /// and replace this half's persisted event/clip sets.
    async fn condense_and_persist(&mut self) -> Result<(), PipelineError> {
        let mut events = std::mem::take(&mut self.state.events);
        events.retain(|e| match e.validate() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "discarding malformed detection");
                false
            }
        });

        let merged = merge_events(events);
        let context = RankContext {
            half_offset_secs: half_offset_secs(self.half),
            total_match_secs: total_match_secs(self.half, self.state.duration_secs),
            score_differential: goal_differential(&merged),
        };
        let ranked = rank_clips(std::mem::take(&mut self.state.clips), &merged, &context);

        let mut new_events = Vec::with_capacity(merged.len());
        for event in &merged {
            new_events.push(NewEvent::from_core(event, needs_review(event.confidence))?);
        }

        // Re-runs replace the half wholesale; corrections re-assert
        // themselves through the review layer afterwards.
        EventRepo::delete_for_half(&self.ctx.pool, self.job.match_id, self.half).await?;
        let rows = EventRepo::insert_many(
            &self.ctx.pool,
            self.job.match_id,
            self.job.id,
            self.half,
            &new_events,
        )
        .await?;

        for row in rows.iter().filter(|r| r.needs_review) {
            ReviewRepo::upsert(&self.ctx.pool, self.job.match_id, row.id, "low_confidence")
                .await?;
            self.ctx.bus.publish(
                AnalysisEvent::new("review.flagged", self.job.match_id)
                    .with_job(self.job.id)
                    .with_payload(serde_json::json!({
                        "kind": "event",
                        "event_id": row.id,
                        "confidence": row.confidence,
                    })),
            );
        }

        let new_clips: Vec<NewClip> = ranked.into_iter().map(NewClip::from).collect();
        ClipRepo::replace_for_half(
            &self.ctx.pool,
            self.job.match_id,
            self.job.id,
            self.half,
            &new_clips,
        )
        .await?;

        tracing::info!(
            job_id = self.job.id,
            events = new_events.len(),
            clips = new_clips.len(),
            "events merged and clips ranked"
        );
        Ok(())
    }

    // -- Identify -------------------------------------------------------------

    /// Resolve track identities from jersey OCR, concurrently per track.
    async fn identify(&mut self) -> Result<(), PipelineError> {
        let tracks = TrackRepo::list_for_job(&self.ctx.pool, self.job.id).await?;
        if tracks.is_empty() {
            tracing::debug!(job_id = self.job.id, "no tracks to identify");
            return Ok(());
        }
        let total = tracks.len();

        let semaphore = Arc::new(Semaphore::new(self.ctx.worker_limit));
        let mut tasks: JoinSet<Result<(String, matchlens_vision::types::OcrResponse), CallError>> =
            JoinSet::new();

        for track in tracks {
            let semaphore = semaphore.clone();
            let resilience = self.resilience.clone();
            let vision = self.ctx.vision.clone();
            let video_path = self.state.video_path.clone();
            let track_key = track.track_key.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| CallError::Network("stage worker pool closed".into()))?;
                let key = track_key.clone();
                let response = resilience
                    .call("vision.ocr_jersey", move |_| {
                        let vision = vision.clone();
                        let video_path = video_path.clone();
                        let key = track_key.clone();
                        async move { vision.ocr_jersey(&video_path, &key).await }
                    })
                    .await?;
                Ok((key, response))
            });
        }

        let mut done = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (track_key, response) = joined
                .map_err(|e| PipelineError::Stage(format!("jersey OCR task failed: {e}")))??;
            self.apply_ocr(&track_key, response).await?;
            done += 1;
            self.progress(PipelineStage::Identify, done as f64 / total as f64)
                .await?;
        }
        Ok(())
    }

    /// Fold one track's fresh readings into its stored mapping.
    async fn apply_ocr(
        &self,
        track_key: &str,
        response: matchlens_vision::types::OcrResponse,
    ) -> Result<(), PipelineError> {
        let existing_row =
            MappingRepo::find_by_key(&self.ctx.pool, self.job.match_id, track_key).await?;
        let existing = match existing_row {
            Some(row) => Some(row.to_core()?),
            None => None,
        };

        let Some(team) = response.team.or_else(|| existing.as_ref().map(|i| i.team)) else {
            tracing::warn!(track_key, "no team assignment for track, skipping identity");
            return Ok(());
        };

        let readings: Vec<_> = response.readings.into_iter().map(Into::into).collect();
        let proposed = identity::propose(existing, track_key, team, &readings);
        let upsert = UpsertMapping::from_core(&proposed)?;
        let saved = MappingRepo::upsert_automated(&self.ctx.pool, self.job.match_id, &upsert).await?;

        if saved.needs_review {
            self.ctx.bus.publish(
                AnalysisEvent::new("review.flagged", self.job.match_id)
                    .with_job(self.job.id)
                    .with_payload(serde_json::json!({
                        "kind": "mapping",
                        "track_key": track_key,
                        "confidence": saved.confidence,
                    })),
            );
        }
        Ok(())
    }

    // -- Aggregate ------------------------------------------------------------

    /// Recompute the match's metric set from its persisted events and
    /// mappings. Reads rows rather than run state so reviewer
    /// corrections landed mid-run are reflected.
    async fn aggregate(&mut self) -> Result<(), PipelineError> {
        let event_rows = EventRepo::list_all(&self.ctx.pool, self.job.match_id).await?;
        let mut events = Vec::with_capacity(event_rows.len());
        for row in &event_rows {
            events.push(row.to_core()?);
        }

        let mapping_rows = MappingRepo::list_for_match(&self.ctx.pool, self.job.match_id).await?;
        let mut identities = Vec::with_capacity(mapping_rows.len());
        for row in &mapping_rows {
            identities.push(row.to_core()?);
        }

        let metrics = stats::compute(&events, &identities);
        for metric in &metrics {
            MetricRepo::upsert(
                &self.ctx.pool,
                self.job.match_id,
                metric.key,
                &metric.scope.key(),
                metric.value,
                metric.confidence,
                &metric.explanation,
            )
            .await?;
        }

        tracing::info!(
            job_id = self.job.id,
            metrics = metrics.len(),
            "stats aggregated"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Whether a detection's confidence puts it in the review queue.
fn needs_review(confidence: f64) -> bool {
    confidence < EVENT_REVIEW_THRESHOLD
}

/// Offset of a half video's t=0 within whole-match time.
fn half_offset_secs(half: Half) -> f64 {
    match half {
        Half::Second => SECOND_HALF_OFFSET_SECS,
        Half::Full | Half::First => 0.0,
    }
}

/// Whole-match duration estimate for the late-match boost.
fn total_match_secs(half: Half, video_duration_secs: f64) -> f64 {
    match half {
        Half::Full => video_duration_secs,
        Half::First | Half::Second => video_duration_secs * 2.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_detections_are_flagged() {
        assert!(needs_review(0.3));
        assert!(needs_review(EVENT_REVIEW_THRESHOLD - 0.001));
        assert!(!needs_review(EVENT_REVIEW_THRESHOLD));
        assert!(!needs_review(0.95));
    }

    #[test]
    fn second_half_video_time_is_offset() {
        assert!((half_offset_secs(Half::Second) - 2700.0).abs() < f64::EPSILON);
        assert!((half_offset_secs(Half::First)).abs() < f64::EPSILON);
        assert!((half_offset_secs(Half::Full)).abs() < f64::EPSILON);
    }

    #[test]
    fn half_videos_double_into_match_duration() {
        assert!((total_match_secs(Half::Full, 5400.0) - 5400.0).abs() < f64::EPSILON);
        assert!((total_match_secs(Half::First, 2700.0) - 5400.0).abs() < f64::EPSILON);
    }
}
