//! Usage telemetry for Stepwise.
//!
//! Every decoding call produces a [`UsageRecord`] that is handed to a
//! [`UsageSink`]. Delivery is fire-and-forget: a failing sink is logged and
//! never affects the reasoning loop.

pub mod ledger;
pub mod model;
pub mod sink;

pub use ledger::UsageLedger;
pub use model::{ModelUsage, UsageRecord, UsageSummary};
pub use sink::{FanoutSink, TracingSink, UsageSink, emit};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("usage delivery failed: {0}")]
    Delivery(String),

    #[error("usage endpoint rejected record (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
