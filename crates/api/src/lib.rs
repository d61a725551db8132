//! HTTP surface for the analysis backend.
//!
//! Thin handlers over the repository and pipeline layers: extract,
//! validate, delegate, wrap in the `{ "data": ... }` envelope. All
//! long-running work happens in the background workers, never in a
//! request.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
