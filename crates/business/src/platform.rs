//! Usage sink that reports LLM usage to the business platform.

use async_trait::async_trait;
use stepwise_telemetry::{TelemetryError, UsageRecord, UsageSink};
use tracing::debug;

/// Posts each usage record to `{api_url}/log_llm`.
pub struct PlatformUsageSink {
    url: String,
    client: reqwest::Client,
}

impl PlatformUsageSink {
    pub fn new(api_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: format!("{}/log_llm", api_url.trim_end_matches('/')),
            client,
        }
    }
}

#[async_trait]
impl UsageSink for PlatformUsageSink {
    async fn record(&self, record: &UsageRecord) -> Result<(), TelemetryError> {
        let body = serde_json::json!({
            "task_id": record.task_id,
            "model": record.model,
            "duration_sec": record.duration_secs,
            "usage": record.usage,
        });

        debug!(task_id = %record.task_id, "Reporting usage to platform");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TelemetryError::Delivery(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Rejected { status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepwise_core::UsageStats;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> UsageRecord {
        UsageRecord::new(
            "task-9",
            "gpt-4o",
            1.5,
            UsageStats {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            },
        )
    }

    #[tokio::test]
    async fn posts_usage_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/log_llm"))
            .and(body_json(json!({
                "task_id": "task-9",
                "model": "gpt-4o",
                "duration_sec": 1.5,
                "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        PlatformUsageSink::new(&server.uri())
            .record(&record())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = PlatformUsageSink::new(&server.uri())
            .record(&record())
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Rejected { status: 500, .. }));
    }
}
