//! Gemini-style backend: schema embedded in the instructions.
//!
//! The backend has no strict schema mode, so the decision schema is appended
//! to the system instruction, JSON output is requested through
//! `responseMimeType`, and the raw text goes through the two-stage parser in
//! [`crate::extract`].

use crate::extract::parse_decision;
use crate::transport::{HttpTransport, JsonTransport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stepwise_core::provider::{DecodeRequest, StructuredDecoder, UsageStats};
use stepwise_core::{Decision, DecodingFailure, Transcript, Turn};
use tracing::{debug, warn};

/// Decoder for the Gemini `generateContent` API.
pub struct GeminiDecoder {
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    transport: Arc<dyn JsonTransport>,
}

impl GeminiDecoder {
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            temperature: 1.0,
            transport: Arc::new(HttpTransport::default()),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replace the HTTP transport (used by tests).
    pub fn with_transport(mut self, transport: Arc<dyn JsonTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Collect instruction turns into one system instruction, wherever they
    /// appear, and append the schema requirement.
    fn extract_system(transcript: &Transcript, schema: &serde_json::Value) -> String {
        let mut system = String::new();
        for turn in transcript.turns() {
            if let Turn::Instruction { content } = turn {
                system.push_str(content);
                system.push('\n');
            }
        }
        let schema_text =
            serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        system.push_str("\n\nYou must respond with valid JSON matching this schema:\n");
        system.push_str(&schema_text);
        system
    }

    /// Convert the remaining turns to `contents`, folding action calls into
    /// model text and observations into user text.
    fn to_api_contents(transcript: &Transcript) -> Vec<GeminiContent> {
        let mut contents: Vec<GeminiContent> = Vec::new();

        for turn in transcript.turns() {
            let (role, text) = match turn {
                Turn::Instruction { .. } => continue,
                Turn::User { content } => ("user", content.clone()),
                Turn::Decision { content, call } => (
                    "model",
                    format!(
                        "{content}\n\nTool calls:\n- {}: {}\n",
                        call.name, call.arguments
                    ),
                ),
                Turn::Observation { content, .. } => ("user", format!("Tool result:\n{content}")),
            };

            // Adjacent turns with the same role share one content entry.
            match contents.last_mut() {
                Some(last) if last.role == role => last.parts.push(GeminiPart { text }),
                _ => contents.push(GeminiContent {
                    role: role.into(),
                    parts: vec![GeminiPart { text }],
                }),
            }
        }

        contents
    }

    fn build_body(&self, request: &DecodeRequest<'_>) -> serde_json::Value {
        serde_json::json!({
            "systemInstruction": {
                "parts": [{"text": Self::extract_system(request.transcript, request.schema)}]
            },
            "contents": Self::to_api_contents(request.transcript),
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": request.max_tokens,
                "responseMimeType": "application/json",
            },
        })
    }

    fn parse_response(
        body: serde_json::Value,
    ) -> Result<(Decision, UsageStats), DecodingFailure> {
        let api_response: GeminiResponse = serde_json::from_value(body).map_err(|e| {
            DecodingFailure::Malformed(format!("Failed to parse response: {e}"))
        })?;

        let usage = api_response
            .usage_metadata
            .map(|u| UsageStats {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        let candidate = api_response.candidates.into_iter().next().ok_or_else(|| {
            DecodingFailure::Malformed("No candidates in response".into())
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            warn!(finish_reason = %reason, "Candidate has no text");
            return Err(DecodingFailure::Malformed(format!(
                "candidate has no text (finish reason: {reason})"
            )));
        }

        Ok((parse_decision(&text)?, usage))
    }
}

#[async_trait]
impl StructuredDecoder for GeminiDecoder {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn decide(
        &self,
        request: DecodeRequest<'_>,
    ) -> Result<(Decision, UsageStats), DecodingFailure> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_body(&request);

        debug!(model = %self.model, turns = request.transcript.len(), "Requesting decision");

        let response = self
            .transport
            .post_json(&url, &[("x-goog-api-key", self.api_key.clone())], &body)
            .await?;

        Self::parse_response(response)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::StubTransport;
    use serde_json::json;
    use stepwise_core::ActionCall;

    fn transcript() -> Transcript {
        let mut t = Transcript::new();
        t.push(Turn::instruction("policy text"));
        t.push(Turn::user("who leads project X?"));
        t.push(Turn::decision(
            "search first\n\nNext step: search",
            ActionCall {
                id: "step_1".into(),
                name: "search_projects".into(),
                arguments: r#"{"tool":"search_projects","query":"X"}"#.into(),
            },
        ));
        t.push(Turn::observation("step_1", r#"{"projects":[]}"#));
        t
    }

    fn generated(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 200, "candidatesTokenCount": 40, "totalTokenCount": 240}
        })
    }

    const DECISION: &str = r#"{"reasoning":"nothing","security_check":"ok","current_state":"done","plan":["reply"],"completed":true,"action":{"tool":"provide_agent_response","message":"No such project","outcome":"ok_not_found","links":[]}}"#;

    #[test]
    fn instructions_become_system_instruction() {
        let schema = json!({"type": "object"});
        let system = GeminiDecoder::extract_system(&transcript(), &schema);
        assert!(system.starts_with("policy text"));
        assert!(system.contains("You must respond with valid JSON matching this schema"));
        assert!(system.contains("\"type\": \"object\""));
    }

    #[test]
    fn turns_fold_into_gemini_roles() {
        let contents = GeminiDecoder::to_api_contents(&transcript());
        let roles: Vec<&str> = contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert!(contents[1].parts[0].text.contains("Tool calls:\n- search_projects: "));
        assert!(contents[2].parts[0].text.starts_with("Tool result:\n"));
    }

    #[test]
    fn adjacent_user_turns_share_content() {
        let mut t = Transcript::new();
        t.push(Turn::user("a"));
        t.push(Turn::user("b"));
        let contents = GeminiDecoder::to_api_contents(&t);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].parts.len(), 2);
    }

    #[tokio::test]
    async fn decide_requests_json_output() {
        let stub = Arc::new(StubTransport::replying(generated(DECISION)));
        let decoder = GeminiDecoder::new("gemini-2.0-flash-exp", "https://gl.example.com/v1beta", "g-key")
            .with_transport(stub.clone());

        let schema = Decision::json_schema();
        let t = transcript();
        let (decision, usage) = decoder
            .decide(DecodeRequest {
                transcript: &t,
                schema: &schema,
                max_tokens: 1024,
            })
            .await
            .unwrap();

        assert_eq!(decision.action.name(), "provide_agent_response");
        assert_eq!(usage.prompt_tokens, 200);
        assert_eq!(usage.total_tokens, 240);

        let sent = stub.last_request();
        assert_eq!(
            sent.url,
            "https://gl.example.com/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
        assert_eq!(sent.headers[0], ("x-goog-api-key".to_string(), "g-key".to_string()));
        assert_eq!(sent.body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(sent.body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn prose_wrapped_output_is_recovered() {
        let body = generated(&format!("Here is the JSON:\n```json\n{DECISION}\n```"));
        let (decision, _) = GeminiDecoder::parse_response(body).unwrap();
        assert!(decision.completed);
    }

    #[test]
    fn blocked_candidate_is_malformed() {
        let body = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let err = GeminiDecoder::parse_response(body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn missing_usage_is_zero_filled() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": DECISION}]}}]});
        let (_, usage) = GeminiDecoder::parse_response(body).unwrap();
        assert_eq!(usage, UsageStats::default());
    }
}
