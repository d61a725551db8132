//! REST client for the perception service.
//!
//! Each method performs exactly one attempt and classifies failures into
//! [`CallError`]; retry policy belongs to the call site, which wraps
//! these methods in [`matchlens_core::retry::call`].

use std::time::Duration;

use matchlens_core::retry::CallError;
use serde::de::DeserializeOwned;

use crate::types::{
    LabelResponse, LabelWindowRequest, OcrRequest, OcrResponse, TrackSubmission, TrackingPoll,
    VideoRequest,
};
use crate::windows::Window;

/// Per-request timeout on the HTTP client itself. Kept above the retry
/// layer's per-attempt timeout so that layer is the one that fires.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for a single perception service instance.
#[derive(Clone)]
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
}

impl VisionClient {
    /// Create a client for the service at `base_url`, e.g.
    /// `http://vision:8090`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, base_url }
    }

    /// Liveness probe: `GET /health`.
    pub async fn health(&self) -> Result<(), CallError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(classify_transport)?;
        check_status(response).await.map(|_| ())
    }

    /// Submit a video for asynchronous player tracking: `POST /track`.
    ///
    /// Returns the service's job id; progress and results come from
    /// [`poll_tracking`](Self::poll_tracking).
    pub async fn submit_tracking(&self, video_path: &str) -> Result<String, CallError> {
        let response = self
            .client
            .post(format!("{}/track", self.base_url))
            .json(&VideoRequest { video_path })
            .send()
            .await
            .map_err(classify_transport)?;
        let submission: TrackSubmission = parse_json(response).await?;
        Ok(submission.job_id)
    }

    /// Poll an asynchronous tracking job: `GET /track/{job_id}`.
    pub async fn poll_tracking(&self, job_id: &str) -> Result<TrackingPoll, CallError> {
        let response = self
            .client
            .get(format!("{}/track/{job_id}", self.base_url))
            .send()
            .await
            .map_err(classify_transport)?;
        parse_json(response).await
    }

    /// Label one window of the video: `POST /label/windows`.
    pub async fn label_window(
        &self,
        video_path: &str,
        window: Window,
    ) -> Result<LabelResponse, CallError> {
        let response = self
            .client
            .post(format!("{}/label/windows", self.base_url))
            .json(&LabelWindowRequest {
                video_path,
                window_id: window.id,
                start_secs: window.start_secs,
                end_secs: window.end_secs,
            })
            .send()
            .await
            .map_err(classify_transport)?;
        parse_json(response).await
    }

    /// Label the whole video in one pass (consolidated variant):
    /// `POST /analyze`.
    pub async fn analyze(&self, video_path: &str) -> Result<LabelResponse, CallError> {
        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(&VideoRequest { video_path })
            .send()
            .await
            .map_err(classify_transport)?;
        parse_json(response).await
    }

    /// Read jersey numbers off one track's crops: `POST /ocr/jersey`.
    pub async fn ocr_jersey(
        &self,
        video_path: &str,
        track_key: &str,
    ) -> Result<OcrResponse, CallError> {
        let response = self
            .client
            .post(format!("{}/ocr/jersey", self.base_url))
            .json(&OcrRequest {
                video_path,
                track_key,
            })
            .send()
            .await
            .map_err(classify_transport)?;
        parse_json(response).await
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Map a reqwest transport failure onto the retry taxonomy.
fn classify_transport(err: reqwest::Error) -> CallError {
    if err.is_timeout() {
        CallError::Timeout(CLIENT_TIMEOUT)
    } else {
        CallError::Network(err.to_string())
    }
}

/// Map an HTTP status onto the retry taxonomy.
fn classify_status(status: u16, body: String) -> CallError {
    match status {
        400 => CallError::BadInput(body),
        401 | 403 => CallError::Auth,
        404 => CallError::NotFound(body),
        429 => CallError::RateLimited,
        _ => CallError::Server { status },
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CallError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(classify_status(status.as_u16(), body));
    }
    Ok(response)
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CallError> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| CallError::Network(format!("malformed response body: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_classification_matches_retry_taxonomy() {
        assert_matches!(classify_status(400, "bad".into()), CallError::BadInput(_));
        assert_matches!(classify_status(401, String::new()), CallError::Auth);
        assert_matches!(classify_status(403, String::new()), CallError::Auth);
        assert_matches!(classify_status(404, "gone".into()), CallError::NotFound(_));
        assert_matches!(classify_status(429, String::new()), CallError::RateLimited);
        assert_matches!(
            classify_status(503, String::new()),
            CallError::Server { status: 503 }
        );
    }

    #[test]
    fn only_transient_statuses_are_retryable() {
        assert!(classify_status(429, String::new()).is_retryable());
        assert!(classify_status(500, String::new()).is_retryable());
        assert!(!classify_status(400, String::new()).is_retryable());
        assert!(!classify_status(404, String::new()).is_retryable());
    }
}
