use matchlens_core::job::PipelineVariant;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Base URL of the perception service (default: `http://localhost:8500`).
    pub vision_url: String,
    /// Root directory of the filesystem blob store (default: `./blobs`).
    pub blob_root: String,
    /// Webhook URL for terminal job and review notifications; unset
    /// disables the notify worker.
    pub notify_webhook_url: Option<String>,
    /// Pipeline variant for jobs queued on video registration
    /// (default: `windowed`).
    pub pipeline_variant: PipelineVariant,
    /// Concurrent work units per stage (default: `4`).
    pub stage_worker_limit: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `VISION_URL`           | `http://localhost:8500`    |
    /// | `BLOB_ROOT`            | `./blobs`                  |
    /// | `NOTIFY_WEBHOOK_URL`   | unset                      |
    /// | `PIPELINE_VARIANT`     | `windowed`                 |
    /// | `STAGE_WORKER_LIMIT`   | `4`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let vision_url =
            std::env::var("VISION_URL").unwrap_or_else(|_| "http://localhost:8500".into());

        let blob_root = std::env::var("BLOB_ROOT").unwrap_or_else(|_| "./blobs".into());

        let notify_webhook_url = std::env::var("NOTIFY_WEBHOOK_URL").ok().filter(|s| !s.is_empty());

        let pipeline_variant = match std::env::var("PIPELINE_VARIANT") {
            Ok(raw) => PipelineVariant::parse(&raw)
                .unwrap_or_else(|| panic!("Unknown PIPELINE_VARIANT '{raw}'")),
            Err(_) => PipelineVariant::Windowed,
        };

        let stage_worker_limit: usize = std::env::var("STAGE_WORKER_LIMIT")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("STAGE_WORKER_LIMIT must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            vision_url,
            blob_root,
            notify_webhook_url,
            pipeline_variant,
            stage_worker_limit,
        }
    }
}
