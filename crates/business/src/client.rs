//! HTTP implementation of [`BusinessApi`].
//!
//! Every call is a JSON `POST` to `{base_url}{route}`. A non-2xx response
//! whose body carries an `error` code becomes [`DispatchError::Business`];
//! every other failure becomes [`DispatchError::Transport`]. Nothing is
//! retried here.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stepwise_core::{Action, BusinessApi, CallerIdentity, DispatchError, KnowledgePage};
use tracing::{debug, warn};

/// Client for one task's slice of the business API.
pub struct BusinessClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl BusinessClient {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            client,
        }
    }

    /// Client scoped to `task_id` under the platform root `api_url`.
    pub fn for_task(api_url: &str, task_id: &str, timeout: std::time::Duration) -> Self {
        Self::new(
            format!("{}/tasks/{task_id}", api_url.trim_end_matches('/')),
            timeout,
        )
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `route` and return the raw JSON response.
    async fn call(
        &self,
        route: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        let url = format!("{}{route}", self.base_url);
        debug!(%url, "Calling business API");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(status, route, body = %text, "Business API returned error");
            return Err(business_error(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }

        serde_json::from_str(&text)
            .map_err(|e| DispatchError::Transport(format!("invalid JSON from {route}: {e}")))
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        route: &str,
        body: &serde_json::Value,
    ) -> Result<T, DispatchError> {
        let value = self.call(route, body).await?;
        serde_json::from_value(value)
            .map_err(|e| DispatchError::Transport(format!("unexpected response from {route}: {e}")))
    }
}

/// Error body returned by the business API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(alias = "code")]
    error: String,
    #[serde(default, alias = "message")]
    detail: Option<String>,
}

fn business_error(status: u16, body: &str) -> DispatchError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => DispatchError::Business {
            code: err.error,
            detail: err.detail.unwrap_or_else(|| format!("HTTP {status}")),
        },
        Err(_) => DispatchError::Transport(format!("HTTP {status}: {body}")),
    }
}

#[derive(Debug, Deserialize)]
struct WikiListing {
    #[serde(default)]
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WikiContent {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl BusinessApi for BusinessClient {
    async fn who_am_i(&self) -> Result<CallerIdentity, DispatchError> {
        self.call_typed("/whoami", &serde_json::json!({})).await
    }

    async fn identity_details(&self, user_id: &str) -> Result<serde_json::Value, DispatchError> {
        self.call("/employees/get", &serde_json::json!({ "id": user_id }))
            .await
    }

    async fn list_pages(&self) -> Result<Vec<String>, DispatchError> {
        let listing: WikiListing = self.call_typed("/wiki/list", &serde_json::json!({})).await?;
        Ok(listing.paths)
    }

    async fn load_page(&self, path: &str) -> Result<KnowledgePage, DispatchError> {
        let page: WikiContent = self
            .call_typed("/wiki/load", &serde_json::json!({ "file": path }))
            .await?;
        Ok(KnowledgePage {
            path: path.to_string(),
            content: page.content,
        })
    }

    async fn dispatch(&self, action: &Action) -> Result<serde_json::Value, DispatchError> {
        self.call(action.route(), &action.payload()).await
    }
}
