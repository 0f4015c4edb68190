//! Data model for usage telemetry: per-call records and aggregated summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stepwise_core::UsageStats;

/// Usage of one decoding call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub task_id: String,
    pub model: String,
    /// Wall-clock duration of the call.
    pub duration_secs: f64,
    pub usage: UsageStats,
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        task_id: impl Into<String>,
        model: impl Into<String>,
        duration_secs: f64,
        usage: UsageStats,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            model: model.into(),
            duration_secs,
            usage,
            recorded_at: Utc::now(),
        }
    }
}

/// Totals for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub duration_secs: f64,
}

impl ModelUsage {
    pub(crate) fn add(&mut self, record: &UsageRecord) {
        self.calls += 1;
        self.prompt_tokens += u64::from(record.usage.prompt_tokens);
        self.completion_tokens += u64::from(record.usage.completion_tokens);
        self.total_tokens += u64::from(record.usage.total_tokens);
        self.duration_secs += record.duration_secs;
    }
}

/// Aggregated usage across calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub totals: ModelUsage,
    pub by_model: BTreeMap<String, ModelUsage>,
    pub tasks: u64,
}

impl UsageSummary {
    /// Summarize an arbitrary set of records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> Self {
        let mut summary = Self::default();
        let mut tasks = std::collections::BTreeSet::new();
        for record in records {
            summary.totals.add(record);
            summary
                .by_model
                .entry(record.model.clone())
                .or_default()
                .add(record);
            tasks.insert(record.task_id.as_str());
        }
        summary.tasks = tasks.len() as u64;
        summary
    }
}
