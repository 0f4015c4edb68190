//! OpenAI-style backend with native schema-constrained decoding.
//!
//! Works with any endpoint exposing `/chat/completions` with
//! `response_format: {type: "json_schema", strict: true}`. The decision
//! schema is strictified (see [`crate::schema`]) and the returned content
//! is parsed strictly; there is no recovery stage for this backend.

use crate::schema::strictify;
use crate::transport::{HttpTransport, JsonTransport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stepwise_core::provider::{DecodeRequest, StructuredDecoder, UsageStats};
use stepwise_core::{Decision, DecodingFailure, Transcript, Turn};
use tracing::debug;

/// Name under which the decision schema is registered with the backend.
const SCHEMA_NAME: &str = "next_step";

/// Decoder for OpenAI-compatible chat completion endpoints.
pub struct OpenAiDecoder {
    model: String,
    base_url: String,
    api_key: String,
    transport: Arc<dyn JsonTransport>,
}

impl OpenAiDecoder {
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            transport: Arc::new(HttpTransport::default()),
        }
    }

    /// Replace the HTTP transport (used by tests).
    pub fn with_transport(mut self, transport: Arc<dyn JsonTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Convert the transcript to chat messages.
    fn to_api_messages(transcript: &Transcript) -> Vec<ApiMessage> {
        transcript
            .turns()
            .iter()
            .map(|turn| match turn {
                Turn::Instruction { content } => ApiMessage::text("system", content),
                Turn::User { content } => ApiMessage::text("user", content),
                Turn::Decision { content, call } => ApiMessage {
                    role: "assistant".into(),
                    content: Some(content.clone()),
                    tool_calls: Some(vec![ApiToolCall {
                        id: call.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    }]),
                    tool_call_id: None,
                },
                Turn::Observation { call_id, content } => ApiMessage {
                    role: "tool".into(),
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(call_id.clone()),
                },
            })
            .collect()
    }

    fn build_body(&self, request: &DecodeRequest<'_>) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(request.transcript),
            "max_completion_tokens": request.max_tokens,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": SCHEMA_NAME,
                    "strict": true,
                    "schema": strictify(request.schema),
                }
            },
        })
    }

    /// Turn a chat completion body into a decision.
    fn parse_response(
        body: serde_json::Value,
    ) -> Result<(Decision, UsageStats), DecodingFailure> {
        let api_response: ApiResponse = serde_json::from_value(body).map_err(|e| {
            DecodingFailure::Malformed(format!("Failed to parse response: {e}"))
        })?;

        let usage = api_response
            .usage
            .map(|u| UsageStats {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DecodingFailure::Malformed("No choices in response".into()))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(DecodingFailure::SchemaViolation(format!(
                "model refused: {refusal}"
            )));
        }

        if choice.finish_reason.as_deref() == Some("length") {
            return Err(DecodingFailure::Malformed(
                "output truncated at the token limit".into(),
            ));
        }

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DecodingFailure::Malformed("response has no content".into()))?;

        Ok((Decision::from_json(&content)?, usage))
    }
}

#[async_trait]
impl StructuredDecoder for OpenAiDecoder {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn decide(
        &self,
        request: DecodeRequest<'_>,
    ) -> Result<(Decision, UsageStats), DecodingFailure> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&request);

        debug!(model = %self.model, turns = request.transcript.len(), "Requesting decision");

        let response = self
            .transport
            .post_json(
                &url,
                &[("Authorization", format!("Bearer {}", self.api_key))],
                &body,
            )
            .await?;

        Self::parse_response(response)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::StubTransport;
    use serde_json::json;
    use stepwise_core::ActionCall;

    fn transcript() -> Transcript {
        let mut t = Transcript::new();
        t.push(Turn::instruction("policy"));
        t.push(Turn::user("list projects"));
        t.push(Turn::decision(
            "need data\n\nNext step: list",
            ActionCall {
                id: "step_1".into(),
                name: "list_projects".into(),
                arguments: r#"{"tool":"list_projects","offset":0,"limit":10}"#.into(),
            },
        ));
        t.push(Turn::observation("step_1", r#"{"projects":[]}"#));
        t
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        })
    }

    const DECISION: &str = r#"{"reasoning":"no projects","security_check":"ok","current_state":"done","plan":["answer"],"completed":true,"action":{"tool":"provide_agent_response","message":"None found","outcome":"ok_not_found","links":[]}}"#;

    #[test]
    fn message_conversion_keeps_roles_and_calls() {
        let messages = OpenAiDecoder::to_api_messages(&transcript());
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);

        let call = &messages[2].tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.id, "step_1");
        assert_eq!(call.function.name, "list_projects");
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("step_1"));
    }

    #[tokio::test]
    async fn decide_sends_strict_schema() {
        let stub = Arc::new(StubTransport::replying(completion(DECISION)));
        let decoder = OpenAiDecoder::new("gpt-4o", "https://api.example.com/v1/", "sk-test")
            .with_transport(stub.clone());

        let schema = Decision::json_schema();
        let t = transcript();
        let (decision, usage) = decoder
            .decide(DecodeRequest {
                transcript: &t,
                schema: &schema,
                max_tokens: 16384,
            })
            .await
            .unwrap();

        assert!(decision.action.is_terminal());
        assert_eq!(usage.total_tokens, 150);

        let sent = stub.last_request();
        assert_eq!(sent.url, "https://api.example.com/v1/chat/completions");
        assert_eq!(sent.headers[0].1, "Bearer sk-test");
        let format = &sent.body["response_format"];
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["strict"], true);
        assert_eq!(format["json_schema"]["schema"]["additionalProperties"], false);
        assert_eq!(sent.body["max_completion_tokens"], 16384);
    }

    #[test]
    fn refusal_is_a_decoding_failure() {
        let body = json!({
            "choices": [{"message": {"content": null, "refusal": "I can't"}, "finish_reason": "stop"}]
        });
        let err = OpenAiDecoder::parse_response(body).unwrap_err();
        assert!(matches!(err, DecodingFailure::SchemaViolation(_)));
    }

    #[test]
    fn no_choices_is_malformed() {
        let err = OpenAiDecoder::parse_response(json!({"choices": []})).unwrap_err();
        assert!(matches!(err, DecodingFailure::Malformed(_)));
    }

    #[test]
    fn truncated_output_is_malformed() {
        let body = json!({
            "choices": [{"message": {"content": "{\"reasoning\":"}, "finish_reason": "length"}]
        });
        assert!(matches!(
            OpenAiDecoder::parse_response(body).unwrap_err(),
            DecodingFailure::Malformed(_)
        ));
    }

    #[test]
    fn missing_usage_is_zero_filled() {
        let mut body = completion(DECISION);
        body.as_object_mut().unwrap().remove("usage");
        let (_, usage) = OpenAiDecoder::parse_response(body).unwrap();
        assert_eq!(usage, UsageStats::default());
    }

    #[test]
    fn prose_content_is_not_recovered() {
        let body = completion(&format!("Here you go: {DECISION}"));
        assert!(matches!(
            OpenAiDecoder::parse_response(body).unwrap_err(),
            DecodingFailure::Malformed(_)
        ));
    }
}
