//! Thread-safe in-memory usage ledger.

use crate::TelemetryError;
use crate::model::{UsageRecord, UsageSummary};
use crate::sink::UsageSink;
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

/// Keeps every usage record of the process and serves summaries.
///
/// Old records are pruned once the ledger grows past `MAX_RECORDS`.
#[derive(Debug, Default)]
pub struct UsageLedger {
    records: RwLock<Vec<UsageRecord>>,
}

const MAX_RECORDS: usize = 10_000;

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&self, record: UsageRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.len() >= MAX_RECORDS {
            records.drain(..MAX_RECORDS / 10);
        }
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records (oldest first).
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records belonging to one task.
    pub fn for_task(&self, task_id: &str) -> Vec<UsageRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Totals across all records.
    pub fn summary(&self) -> UsageSummary {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        UsageSummary::from_records(records.iter())
    }
}

#[async_trait]
impl UsageSink for UsageLedger {
    async fn record(&self, record: &UsageRecord) -> Result<(), TelemetryError> {
        self.push(record.clone());
        Ok(())
    }
}
