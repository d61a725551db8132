//! HTTP client for the perception (computer vision) service.
//!
//! The perception service does the pixel work: player tracking, event
//! labeling, jersey OCR. This crate wraps its REST API with typed
//! request/response DTOs and maps HTTP failures onto the retry error
//! taxonomy in [`matchlens_core::retry`], so every call site can run
//! under the resilient caller.

pub mod client;
pub mod types;
pub mod windows;

pub use client::VisionClient;
pub use types::{LabelResponse, RawEvent, RawScene, RawTrack, TrackingPoll, TrackingStatus};
pub use windows::{split_windows, Window, WINDOW_OVERLAP_SECS, WINDOW_SECS};
