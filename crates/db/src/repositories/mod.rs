//! Repositories: unit structs with static async methods over `&PgPool`.
//!
//! Every mutation is either an insert or a targeted column update, so
//! reviewer corrections and stage completions never clobber each other's
//! writes on the same row.

mod clip_repo;
mod event_repo;
mod job_repo;
mod mapping_repo;
mod match_repo;
mod metric_repo;
mod review_repo;
mod stage_timing_repo;
mod track_repo;

pub use clip_repo::ClipRepo;
pub use event_repo::EventRepo;
pub use job_repo::JobRepo;
pub use mapping_repo::MappingRepo;
pub use match_repo::MatchRepo;
pub use metric_repo::MetricRepo;
pub use review_repo::ReviewRepo;
pub use stage_timing_repo::StageTimingRepo;
pub use track_repo::TrackRepo;
