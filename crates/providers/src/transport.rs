//! JSON-over-HTTP transport used by the decoding backends.
//!
//! Backends build a request body and interpret the response body; the
//! transport only moves JSON and maps HTTP failures onto [`DecodingFailure`].
//! Tests swap in a scripted transport to exercise the adapters offline.

use async_trait::async_trait;
use stepwise_core::DecodingFailure;
use tracing::{debug, warn};

/// Moves one JSON request to a backend and returns its JSON response.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DecodingFailure>;
}

/// The production transport, backed by a shared `reqwest::Client`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(120))
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DecodingFailure> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        debug!(url, "Sending decoding request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DecodingFailure::Network(format!("request timed out: {e}"))
            } else {
                DecodingFailure::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(DecodingFailure::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(DecodingFailure::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(DecodingFailure::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DecodingFailure::Malformed(format!("response body is not JSON: {e}")))
    }
}
