//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all Stepwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Decoding errors ---
    #[error("Decoding failure: {0}")]
    Decoding(#[from] DecodingFailure),

    // --- Dispatch errors ---
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A structured decoding call could not produce a valid decision.
///
/// Never retried inside a step: the loop turns any of these into its
/// abort path.
#[derive(Debug, Clone, Error)]
pub enum DecodingFailure {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed model output: {0}")]
    Malformed(String),

    #[error("Decision violates schema: {0}")]
    SchemaViolation(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// A dispatched action failed.
///
/// None of these are fatal to the loop; they become the next
/// observation turn.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Domain-level rejection returned by the business API.
    #[error("API Error: {code}\nDetails: {detail}")]
    Business { code: String, detail: String },

    /// Anything else: transport, serialization, unexpected payloads.
    #[error("Unexpected error: {0}")]
    Transport(String),

    /// Refused locally by the enforced policy layer.
    #[error("Policy denied: {0}")]
    PolicyDenied(String),
}

impl DispatchError {
    /// Short machine-readable label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Business { .. } => "business",
            Self::Transport(_) => "transport",
            Self::PolicyDenied(_) => "policy_denied",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_failure_displays_correctly() {
        let err = Error::Decoding(DecodingFailure::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn business_and_transport_render_distinct_prefixes() {
        let business = DispatchError::Business {
            code: "not_found".into(),
            detail: "project proj_x does not exist".into(),
        };
        let transport = DispatchError::Transport("connection reset".into());

        assert_eq!(
            business.to_string(),
            "API Error: not_found\nDetails: project proj_x does not exist"
        );
        assert_eq!(transport.to_string(), "Unexpected error: connection reset");
        assert_eq!(business.kind(), "business");
        assert_eq!(transport.kind(), "transport");
    }
}
