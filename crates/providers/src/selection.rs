//! Backend selection: one closed enum over the two decoders.
//!
//! The backend is chosen once from configuration by the pure
//! [`stepwise_config::select_backend`] and then used for every step of a
//! task. The loop only sees [`StructuredDecoder`].

use crate::gemini::GeminiDecoder;
use crate::openai::OpenAiDecoder;
use async_trait::async_trait;
use stepwise_config::{AppConfig, BackendKind, ConfigError, ResolvedBackend};
use stepwise_core::provider::{DecodeRequest, StructuredDecoder, UsageStats};
use stepwise_core::{Decision, DecodingFailure};
use tracing::info;

/// The decoding backend for a process.
pub enum DecodingProvider {
    /// Native schema-constrained decoding.
    OpenAi(OpenAiDecoder),
    /// Schema-in-instructions plus JSON extraction.
    Gemini(GeminiDecoder),
}

impl DecodingProvider {
    /// Select and build the backend described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let resolved = config.resolve_backend()?;
        info!(backend = %resolved.kind, model = %resolved.model, "Selected decoding backend");
        Ok(Self::from_resolved(&resolved, config.agent.temperature))
    }

    /// Build a backend from already-resolved settings.
    pub fn from_resolved(resolved: &ResolvedBackend, temperature: f32) -> Self {
        match resolved.kind {
            BackendKind::OpenAi => Self::OpenAi(OpenAiDecoder::new(
                &resolved.model,
                &resolved.base_url,
                &resolved.api_key,
            )),
            BackendKind::Gemini => Self::Gemini(
                GeminiDecoder::new(&resolved.model, &resolved.base_url, &resolved.api_key)
                    .with_temperature(temperature),
            ),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::OpenAi(_) => BackendKind::OpenAi,
            Self::Gemini(_) => BackendKind::Gemini,
        }
    }
}

#[async_trait]
impl StructuredDecoder for DecodingProvider {
    fn name(&self) -> &str {
        match self {
            Self::OpenAi(d) => d.name(),
            Self::Gemini(d) => d.name(),
        }
    }

    fn model(&self) -> &str {
        match self {
            Self::OpenAi(d) => d.model(),
            Self::Gemini(d) => d.model(),
        }
    }

    async fn decide(
        &self,
        request: DecodeRequest<'_>,
    ) -> Result<(Decision, UsageStats), DecodingFailure> {
        match self {
            Self::OpenAi(d) => d.decide(request).await,
            Self::Gemini(d) => d.decide(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::StubTransport;
    use serde_json::json;
    use std::sync::Arc;
    use stepwise_core::{ActionCall, Transcript, Turn};

    fn config_with(openai: Option<&str>, google: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.openai.api_key = openai.map(String::from);
        config.google.api_key = google.map(String::from);
        config
    }

    #[test]
    fn both_keys_select_openai() {
        let provider = DecodingProvider::from_config(&config_with(Some("sk"), Some("g"))).unwrap();
        assert_eq!(provider.kind(), BackendKind::OpenAi);
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn google_only_selects_gemini() {
        let provider = DecodingProvider::from_config(&config_with(None, Some("g"))).unwrap();
        assert_eq!(provider.kind(), BackendKind::Gemini);
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "gemini-2.0-flash-exp");
    }

    #[test]
    fn no_keys_is_an_error() {
        assert!(matches!(
            DecodingProvider::from_config(&config_with(None, None)),
            Err(ConfigError::NoBackend)
        ));
    }

    #[tokio::test]
    async fn both_backends_decode_identical_decisions() {
        let canonical = json!({
            "reasoning": "The caller asked for their projects.",
            "security_check": "Known employee, read access allowed.",
            "current_state": "have the list",
            "plan": ["answer with the list", "done"],
            "completed": false,
            "action": {
                "tool": "provide_agent_response",
                "message": "You work on Apollo.",
                "outcome": "ok_answer",
                "links": [{"kind": "project", "id": "proj_apollo"}]
            }
        });
        let text = canonical.to_string();

        let openai_stub = Arc::new(StubTransport::replying(json!({
            "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })));
        let gemini_stub = Arc::new(StubTransport::replying(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 11, "candidatesTokenCount": 6, "totalTokenCount": 17}
        })));

        let openai = DecodingProvider::OpenAi(
            OpenAiDecoder::new("gpt-4o", "http://stub", "k").with_transport(openai_stub),
        );
        let gemini = DecodingProvider::Gemini(
            GeminiDecoder::new("gemini-2.0-flash-exp", "http://stub", "k")
                .with_transport(gemini_stub),
        );

        let mut transcript = Transcript::new();
        transcript.push(Turn::instruction("rules"));
        transcript.push(Turn::user("what am I working on?"));
        transcript.push(Turn::decision(
            "look up projects\n\nNext step: search",
            ActionCall {
                id: "step_1".into(),
                name: "search_projects".into(),
                arguments: r#"{"tool":"search_projects","team_member":"jane"}"#.into(),
            },
        ));
        transcript.push(Turn::observation("step_1", r#"{"projects":[{"id":"proj_apollo"}]}"#));

        let schema = Decision::json_schema();
        let request = DecodeRequest {
            transcript: &transcript,
            schema: &schema,
            max_tokens: 16384,
        };

        let (from_openai, _) = openai.decide(request).await.unwrap();
        let (from_gemini, _) = gemini.decide(request).await.unwrap();
        assert_eq!(from_openai, from_gemini);
        assert_eq!(
            serde_json::to_value(&from_openai).unwrap(),
            serde_json::to_value(&from_gemini).unwrap()
        );
    }
}
