use std::sync::Arc;

use matchlens_events::EventBus;
use matchlens_pipeline::{BlobStore, UploadQueue};
use matchlens_vision::VisionClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: matchlens_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Broadcast bus for analysis lifecycle events.
    pub bus: Arc<EventBus>,
    /// Blob store holding videos and tracking documents.
    pub blob: Arc<dyn BlobStore>,
    /// Staged-upload queue drained by the upload worker.
    pub upload_queue: Arc<UploadQueue>,
    /// Perception service client (used by the health probe).
    pub vision: VisionClient,
}
