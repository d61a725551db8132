//! Pure domain logic for the matchlens analysis backend.
//!
//! Everything in this crate is side-effect free apart from `retry`, which
//! owns the async sleep/timeout plumbing around external calls. No database
//! access and no internal crate deps, so the api, pipeline, and worker
//! layers can all share it.

pub mod dedup;
pub mod error;
pub mod error_debounce;
pub mod event;
pub mod identity;
pub mod job;
pub mod progress;
pub mod ranking;
pub mod retry;
pub mod stats;
pub mod storage;
pub mod track;
pub mod types;

pub use error::CoreError;
