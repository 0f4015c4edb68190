//! StructuredDecoder trait: the abstraction over decoding backends.
//!
//! A decoder takes the backend-agnostic transcript plus the decision schema
//! and returns exactly one validated [`Decision`], or a [`DecodingFailure`].
//! It never hands back a partially populated decision.
//!
//! Implementations: native-schema (OpenAI-style) and schema-prompted
//! (Gemini-style) backends in `stepwise-providers`.

use crate::decision::Decision;
use crate::error::DecodingFailure;
use crate::transcript::Transcript;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Inputs for one decoding call.
#[derive(Debug, Clone, Copy)]
pub struct DecodeRequest<'a> {
    /// The full transcript so far.
    pub transcript: &'a Transcript,

    /// JSON Schema of [`Decision`] (see [`Decision::json_schema`]).
    pub schema: &'a serde_json::Value,

    /// Maximum tokens the backend may generate.
    pub max_tokens: u32,
}

/// Token usage for one decoding call. Zero-filled when the backend does
/// not report counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl UsageStats {
    /// Sum two usage records.
    pub fn add(self, other: UsageStats) -> UsageStats {
        UsageStats {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

/// The core decoding trait.
///
/// The reasoning loop calls `decide()` once per step without knowing which
/// backend sits behind it.
#[async_trait]
pub trait StructuredDecoder: Send + Sync {
    /// A human-readable backend name (e.g. "openai", "gemini").
    fn name(&self) -> &str;

    /// The model the backend is asked to use.
    fn model(&self) -> &str;

    /// Produce one validated decision for the transcript.
    async fn decide(
        &self,
        request: DecodeRequest<'_>,
    ) -> std::result::Result<(Decision, UsageStats), DecodingFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_add_sums_fields() {
        let a = UsageStats {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let total = a.add(a);
        assert_eq!(total.prompt_tokens, 20);
        assert_eq!(total.completion_tokens, 10);
        assert_eq!(total.total_tokens, 30);
    }

    #[test]
    fn usage_add_saturates() {
        let big = UsageStats {
            prompt_tokens: u32::MAX,
            completion_tokens: 0,
            total_tokens: u32::MAX,
        };
        assert_eq!(big.add(big).total_tokens, u32::MAX);
    }
}
