//! Analysis job lifecycle: statuses, pipeline variants, stages, and the
//! state machine governing transitions.
//!
//! Lives in `core` (zero internal deps) so the API layer, the pipeline
//! runner, and the recompute worker all agree on one set of rules.

// ---------------------------------------------------------------------------
// Halves and match formats
// ---------------------------------------------------------------------------

/// Which portion of the match a video file (and its analysis job) covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    /// Whole match in one file.
    Full,
    First,
    Second,
}

impl Half {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::First => "first",
            Self::Second => "second",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "first" => Some(Self::First),
            "second" => Some(Self::Second),
            _ => None,
        }
    }
}

/// How the match footage was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFormat {
    SingleVideo,
    TwoHalves,
}

impl MatchFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleVideo => "single_video",
            Self::TwoHalves => "two_halves",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single_video" => Some(Self::SingleVideo),
            "two_halves" => Some(Self::TwoHalves),
            _ => None,
        }
    }

    /// The halves a match of this format is expected to register.
    pub fn expected_halves(self) -> &'static [Half] {
        match self {
            Self::SingleVideo => &[Half::Full],
            Self::TwoHalves => &[Half::First, Half::Second],
        }
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle status of an analysis job.
///
/// `Partial` never appears on a per-half job row; it is produced only by
/// [`combined_status`] when one half of a two-half match has finished and
/// the other has not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Queued,
    Running,
    Partial,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Partial => "partial",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "partial" => Some(Self::Partial),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Terminal statuses hold their artifacts; a new run replaces them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Returns the set of statuses reachable from `from`.
///
/// Transitions are monotonic within a run. The only backward edge is
/// `Error -> Queued` (manual retry). `Done` is strictly terminal: a re-run
/// is a fresh job row, never a reset of a finished one.
pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
    match from {
        JobStatus::Idle => &[JobStatus::Queued],
        JobStatus::Queued => &[JobStatus::Running],
        JobStatus::Running => &[JobStatus::Done, JobStatus::Error],
        JobStatus::Done => &[],
        JobStatus::Error => &[JobStatus::Queued],
        // Computed aggregate, never stored, never transitioned.
        JobStatus::Partial => &[],
    }
}

/// Check whether a transition from `from` to `to` is valid.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a state transition, returning an error message for invalid ones.
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), String> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(format!(
            "Invalid transition: {} -> {}",
            from.as_str(),
            to.as_str()
        ))
    }
}

// ---------------------------------------------------------------------------
// Pipeline variants and stages
// ---------------------------------------------------------------------------

/// Which pipeline shape a job runs. Chosen at job creation and stored on
/// the job row; progress reporting always uses the stored variant's stage
/// table, so a config change mid-run cannot skew percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    /// Many small calls: track the video, then label overlapping windows
    /// concurrently, then merge duplicate sightings across windows.
    Windowed,
    /// Few large calls: one consolidated analysis pass over the whole
    /// half. Cheaper against rate limits, coarser progress.
    Consolidated,
}

impl PipelineVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windowed => "windowed",
            Self::Consolidated => "consolidated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "windowed" => Some(Self::Windowed),
            "consolidated" => Some(Self::Consolidated),
            _ => None,
        }
    }

    /// Ordered stage list for this variant.
    pub fn stages(self) -> &'static [PipelineStage] {
        match self {
            Self::Windowed => &[
                PipelineStage::Prepare,
                PipelineStage::Track,
                PipelineStage::LabelWindows,
                PipelineStage::MergeRank,
                PipelineStage::Identify,
                PipelineStage::Aggregate,
            ],
            Self::Consolidated => &[
                PipelineStage::Prepare,
                PipelineStage::Analyze,
                PipelineStage::Identify,
                PipelineStage::Aggregate,
            ],
        }
    }

    /// Progress weight of `stage` within this variant. Weights across
    /// [`stages`](Self::stages) sum to 100.
    pub fn stage_weight(self, stage: PipelineStage) -> u32 {
        match (self, stage) {
            (Self::Windowed, PipelineStage::Prepare) => 5,
            (Self::Windowed, PipelineStage::Track) => 30,
            (Self::Windowed, PipelineStage::LabelWindows) => 35,
            (Self::Windowed, PipelineStage::MergeRank) => 10,
            (Self::Windowed, PipelineStage::Identify) => 10,
            (Self::Windowed, PipelineStage::Aggregate) => 10,
            (Self::Consolidated, PipelineStage::Prepare) => 5,
            (Self::Consolidated, PipelineStage::Analyze) => 70,
            (Self::Consolidated, PipelineStage::Identify) => 15,
            (Self::Consolidated, PipelineStage::Aggregate) => 10,
            // Stage not part of this variant.
            _ => 0,
        }
    }
}

/// A single step of the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Validate the video, stage it into the blob store.
    Prepare,
    /// Submit a tracking job to the perception service and poll it.
    Track,
    /// Label overlapping time windows with raw events (windowed variant).
    LabelWindows,
    /// Single consolidated analysis call (consolidated variant).
    Analyze,
    /// Merge duplicate events across windows, score and rank clips.
    MergeRank,
    /// Resolve track identities from jersey OCR.
    Identify,
    /// Compute confidence-weighted stats.
    Aggregate,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Track => "track",
            Self::LabelWindows => "label_windows",
            Self::Analyze => "analyze",
            Self::MergeRank => "merge_rank",
            Self::Identify => "identify",
            Self::Aggregate => "aggregate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prepare" => Some(Self::Prepare),
            "track" => Some(Self::Track),
            "label_windows" => Some(Self::LabelWindows),
            "analyze" => Some(Self::Analyze),
            "merge_rank" => Some(Self::MergeRank),
            "identify" => Some(Self::Identify),
            "aggregate" => Some(Self::Aggregate),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Combined match status
// ---------------------------------------------------------------------------

/// Roll two per-half job statuses up into one match-level status.
///
/// `None` means no job exists for that half yet (video not registered or
/// analysis never requested). The `Partial` aggregate marks the long-lived
/// legitimate state where one half is fully analyzed and readable while
/// the other is absent or still working.
pub fn combined_status(first: Option<JobStatus>, second: Option<JobStatus>) -> JobStatus {
    use JobStatus::*;

    let halves = [first, second];
    let any = |s: JobStatus| halves.iter().any(|h| *h == Some(s));
    let done_count = halves.iter().filter(|h| **h == Some(Done)).count();

    if any(Error) {
        return Error;
    }
    if done_count == 2 {
        return Done;
    }
    if done_count == 1 {
        return Partial;
    }
    if any(Running) {
        return Running;
    }
    if any(Queued) {
        return Queued;
    }
    if any(Idle) {
        return Idle;
    }
    Idle
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- state machine --

    #[test]
    fn queued_job_can_start_running() {
        assert!(can_transition(JobStatus::Queued, JobStatus::Running));
    }

    #[test]
    fn running_job_can_finish_or_fail() {
        assert!(can_transition(JobStatus::Running, JobStatus::Done));
        assert!(can_transition(JobStatus::Running, JobStatus::Error));
    }

    #[test]
    fn error_job_can_be_requeued() {
        assert!(can_transition(JobStatus::Error, JobStatus::Queued));
    }

    #[test]
    fn done_is_terminal() {
        assert!(valid_transitions(JobStatus::Done).is_empty());
    }

    #[test]
    fn no_backward_edge_from_running() {
        assert!(!can_transition(JobStatus::Running, JobStatus::Queued));
        assert!(!can_transition(JobStatus::Running, JobStatus::Idle));
    }

    #[test]
    fn partial_is_never_a_transition_target() {
        for from in [
            JobStatus::Idle,
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert!(!can_transition(from, JobStatus::Partial));
        }
    }

    #[test]
    fn validate_transition_reports_names() {
        let err = validate_transition(JobStatus::Done, JobStatus::Running).unwrap_err();
        assert!(err.contains("done"));
        assert!(err.contains("running"));
    }

    // -- stage tables --

    #[test]
    fn windowed_stage_weights_sum_to_100() {
        let v = PipelineVariant::Windowed;
        let total: u32 = v.stages().iter().map(|s| v.stage_weight(*s)).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn consolidated_stage_weights_sum_to_100() {
        let v = PipelineVariant::Consolidated;
        let total: u32 = v.stages().iter().map(|s| v.stage_weight(*s)).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn both_variants_end_with_identify_then_aggregate() {
        for v in [PipelineVariant::Windowed, PipelineVariant::Consolidated] {
            let stages = v.stages();
            let n = stages.len();
            assert_eq!(stages[n - 2], PipelineStage::Identify);
            assert_eq!(stages[n - 1], PipelineStage::Aggregate);
        }
    }

    #[test]
    fn foreign_stage_has_zero_weight() {
        assert_eq!(
            PipelineVariant::Consolidated.stage_weight(PipelineStage::Track),
            0
        );
    }

    // -- combined_status --

    #[test]
    fn combined_no_jobs_is_idle() {
        assert_eq!(combined_status(None, None), JobStatus::Idle);
    }

    #[test]
    fn combined_one_done_other_absent_is_partial() {
        assert_eq!(
            combined_status(Some(JobStatus::Done), None),
            JobStatus::Partial
        );
    }

    #[test]
    fn combined_one_done_other_running_stays_partial() {
        assert_eq!(
            combined_status(Some(JobStatus::Done), Some(JobStatus::Running)),
            JobStatus::Partial
        );
    }

    #[test]
    fn combined_both_done_is_done() {
        assert_eq!(
            combined_status(Some(JobStatus::Done), Some(JobStatus::Done)),
            JobStatus::Done
        );
    }

    #[test]
    fn combined_error_wins_over_partial() {
        assert_eq!(
            combined_status(Some(JobStatus::Done), Some(JobStatus::Error)),
            JobStatus::Error
        );
    }

    #[test]
    fn combined_running_before_any_done() {
        assert_eq!(
            combined_status(Some(JobStatus::Running), Some(JobStatus::Queued)),
            JobStatus::Running
        );
    }

    #[test]
    fn combined_queued_only() {
        assert_eq!(
            combined_status(Some(JobStatus::Queued), None),
            JobStatus::Queued
        );
    }

    // -- parsing --

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            JobStatus::Idle,
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Partial,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobStatus::parse("bogus"), None);
    }

    #[test]
    fn format_expected_halves() {
        assert_eq!(
            MatchFormat::TwoHalves.expected_halves(),
            &[Half::First, Half::Second]
        );
        assert_eq!(MatchFormat::SingleVideo.expected_halves(), &[Half::Full]);
    }
}
