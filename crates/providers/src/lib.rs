//! Structured decoding backends for Stepwise.
//!
//! Both backends implement `stepwise_core::StructuredDecoder`. The
//! [`DecodingProvider`] enum picks one from configuration.

pub mod extract;
pub mod gemini;
pub mod openai;
pub mod schema;
pub mod selection;
pub mod transport;

pub use gemini::GeminiDecoder;
pub use openai::OpenAiDecoder;
pub use selection::DecodingProvider;
pub use transport::{HttpTransport, JsonTransport};
