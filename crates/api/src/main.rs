use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use matchlens_events::{EventBus, NotifyWorker};
use matchlens_pipeline::{
    FsBlobStore, Orchestrator, PipelineContext, RecomputeWorker, UploadQueue, UploadWorker,
};
use matchlens_vision::VisionClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchlens_api::config::ServerConfig;
use matchlens_api::router::build_app_router;
use matchlens_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchlens_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = matchlens_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    matchlens_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    matchlens_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Shared services ---
    let bus = Arc::new(EventBus::default());
    let vision = VisionClient::new(config.vision_url.clone());
    let blob: Arc<dyn matchlens_pipeline::BlobStore> =
        Arc::new(FsBlobStore::new(config.blob_root.clone()));
    let upload_queue = Arc::new(UploadQueue::new());

    // --- Background workers ---
    let shutdown = CancellationToken::new();

    let ctx = PipelineContext {
        pool: pool.clone(),
        bus: Arc::clone(&bus),
        vision: vision.clone(),
        blob: Arc::clone(&blob),
        retry: Default::default(),
        worker_limit: config.stage_worker_limit,
    };
    let orchestrator_handle = tokio::spawn(Orchestrator::new(ctx).run(shutdown.clone()));

    let recompute_handle =
        tokio::spawn(RecomputeWorker::new(pool.clone(), Arc::clone(&bus)).run(shutdown.clone()));

    let upload_worker = UploadWorker::new(
        pool.clone(),
        Arc::clone(&upload_queue),
        Arc::clone(&blob),
        Arc::clone(&bus),
        config.pipeline_variant,
    );
    let upload_handle = tokio::spawn(upload_worker.run(shutdown.clone()));

    let notify_handle = config.notify_webhook_url.clone().map(|url| {
        let worker = NotifyWorker::new(url);
        let bus = Arc::clone(&bus);
        let token = shutdown.clone();
        tokio::spawn(async move { worker.run(&bus, token).await })
    });
    if notify_handle.is_none() {
        tracing::info!("NOTIFY_WEBHOOK_URL unset, webhook notifications disabled");
    }

    tracing::info!("Background workers started (orchestrator, recompute, upload, notify)");

    // --- App state and router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        bus: Arc::clone(&bus),
        blob,
        upload_queue,
        vision,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(10), orchestrator_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), recompute_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), upload_handle).await;
    if let Some(handle) = notify_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
