//! Usage sinks: where usage records go after each decoding call.
//!
//! Sinks report failure through `Result`, but callers treat delivery as
//! fire-and-forget; see [`emit`].

use crate::TelemetryError;
use crate::model::UsageRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// A destination for usage records.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: &UsageRecord) -> Result<(), TelemetryError>;
}

/// Deliver a record, logging and discarding any failure.
pub async fn emit(sink: &dyn UsageSink, record: &UsageRecord) {
    if let Err(e) = sink.record(record).await {
        warn!(task_id = %record.task_id, error = %e, "Failed to record usage");
    }
}

/// Writes each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl UsageSink for TracingSink {
    async fn record(&self, record: &UsageRecord) -> Result<(), TelemetryError> {
        info!(
            task_id = %record.task_id,
            model = %record.model,
            duration_secs = record.duration_secs,
            prompt_tokens = record.usage.prompt_tokens,
            completion_tokens = record.usage.completion_tokens,
            total_tokens = record.usage.total_tokens,
            "LLM usage"
        );
        Ok(())
    }
}

/// Forwards every record to each inner sink.
///
/// All sinks are attempted even when an earlier one fails; the first
/// failure is returned.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn UsageSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl UsageSink for FanoutSink {
    async fn record(&self, record: &UsageRecord) -> Result<(), TelemetryError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(record).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UsageLedger;
    use stepwise_core::UsageStats;

    struct FailingSink;

    #[async_trait]
    impl UsageSink for FailingSink {
        async fn record(&self, _record: &UsageRecord) -> Result<(), TelemetryError> {
            Err(TelemetryError::Delivery("platform unreachable".into()))
        }
    }

    fn record() -> UsageRecord {
        UsageRecord::new("t1", "gpt-4o", 0.1, UsageStats::default())
    }

    #[tokio::test]
    async fn fanout_reaches_every_sink_despite_failure() {
        let ledger = Arc::new(UsageLedger::new());
        let fanout = FanoutSink::new()
            .with(Arc::new(FailingSink))
            .with(Arc::new(TracingSink))
            .with(ledger.clone());

        let result = fanout.record(&record()).await;
        assert!(matches!(result, Err(TelemetryError::Delivery(_))));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn emit_swallows_errors() {
        // Must not panic or propagate.
        emit(&FailingSink, &record()).await;
    }

    #[tokio::test]
    async fn empty_fanout_succeeds() {
        let fanout = FanoutSink::new();
        assert!(fanout.is_empty());
        assert!(fanout.record(&record()).await.is_ok());
    }
}
