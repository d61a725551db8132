//! Fire-and-forget webhook notifications.
//!
//! [`NotifyWorker`] subscribes to the [`EventBus`] and forwards the events
//! an external client cares about to a configured webhook URL. Delivery
//! failures are logged and swallowed: notifications are best-effort, the
//! progress surface in Postgres is the source of truth.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bus::{AnalysisEvent, EventBus};

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Event types forwarded to the webhook.
const NOTIFIED_TYPES: [&str; 4] = ["job.done", "job.error", "job.partial", "review.flagged"];

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers analysis events to an external webhook endpoint.
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    /// Deliver an event payload to a webhook URL with retry.
    ///
    /// Retries up to 3 times with exponential backoff before giving up.
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, url: &str, event: &AnalysisEvent) -> Result<(), WebhookError> {
        let payload = serde_json::json!({
            "event_type": event.event_type,
            "match_id": event.match_id,
            "job_id": event.job_id,
            "payload": event.payload,
            "timestamp": event.timestamp,
        });

        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(url, &payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(url, &payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(url, error = %e, "Webhook delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, url: &str, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// NotifyWorker
// ---------------------------------------------------------------------------

/// Background task forwarding notifiable bus events to a webhook.
pub struct NotifyWorker {
    url: String,
    delivery: WebhookDelivery,
}

impl NotifyWorker {
    pub fn new(url: String) -> Self {
        Self {
            url,
            delivery: WebhookDelivery::new(),
        }
    }

    /// Whether this event type is pushed externally.
    pub fn is_notified(event_type: &str) -> bool {
        NOTIFIED_TYPES.contains(&event_type)
    }

    /// Consume bus events until cancelled.
    ///
    /// A lagged receiver (bus buffer overrun) resubscribes implicitly by
    /// continuing to read; skipped notifications are logged and lost.
    pub async fn run(self, bus: &EventBus, shutdown: CancellationToken) {
        let mut rx = bus.subscribe();
        tracing::info!(url = %self.url, "notification dispatcher started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("notification dispatcher stopping");
                    return;
                }
                received = rx.recv() => match received {
                    Ok(event) => {
                        if !Self::is_notified(&event.event_type) {
                            continue;
                        }
                        if let Err(e) = self.delivery.deliver(&self.url, &event).await {
                            tracing::warn!(
                                event_type = %event.event_type,
                                match_id = event.match_id,
                                error = %e,
                                "dropping undeliverable notification"
                            );
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notification dispatcher lagged behind the bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        tracing::info!("event bus closed, notification dispatcher stopping");
                        return;
                    }
                },
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notified_types_cover_terminal_job_states() {
        assert!(NotifyWorker::is_notified("job.done"));
        assert!(NotifyWorker::is_notified("job.error"));
        assert!(NotifyWorker::is_notified("job.partial"));
        assert!(NotifyWorker::is_notified("review.flagged"));
        assert!(!NotifyWorker::is_notified("job.running"));
        assert!(!NotifyWorker::is_notified("stats.recalculated"));
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[tokio::test]
    async fn worker_stops_on_cancellation() {
        let bus = EventBus::default();
        let shutdown = CancellationToken::new();
        let worker = NotifyWorker::new("http://localhost:1/hook".into());

        let handle = {
            let shutdown = shutdown.clone();
            let bus_ref = &bus;
            async move { worker.run(bus_ref, shutdown).await }
        };

        shutdown.cancel();
        // Completes promptly because cancellation fires before any event.
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop once cancelled");
    }
}
