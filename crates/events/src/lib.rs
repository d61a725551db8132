//! Matchlens event bus and notification infrastructure.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`AnalysisEvent`]: the canonical domain event envelope.
//! - [`notify`]: fire-and-forget webhook dispatcher for the events a
//!   coach-facing client cares about (job finished, review flagged).

pub mod bus;
pub mod notify;

pub use bus::{AnalysisEvent, EventBus};
pub use notify::{NotifyWorker, WebhookDelivery};
