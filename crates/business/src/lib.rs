//! Business API client for Stepwise.
//!
//! [`BusinessClient`] implements `stepwise_core::BusinessApi` over HTTP;
//! [`PlatformUsageSink`] reports LLM usage to the same platform.

pub mod client;
pub mod platform;

pub use client::BusinessClient;
pub use platform::PlatformUsageSink;
