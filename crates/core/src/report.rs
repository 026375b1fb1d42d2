use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ReportSinkError;
use crate::event::CallEvent;

/// One durable audit record: a decision authority flagged this call as worth
/// reporting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub timestamp: DateTime<Utc>,
    pub digest: String,
    pub event: CallEvent,
}

impl ReportRecord {
    pub fn new(event: CallEvent) -> Self {
        Self { timestamp: Utc::now(), digest: event.digest(), event }
    }
}

/// Append-only destination for report records. Write failures must never
/// abort the caller's operation; the probe pipeline logs and swallows them.
pub trait ReportSink: Send + Sync {
    fn append(&self, record: &ReportRecord) -> Result<(), ReportSinkError>;
}

/// Discards every record. The default sink when no supervision report is
/// wanted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReportSink;

impl ReportSink for NoopReportSink {
    fn append(&self, _record: &ReportRecord) -> Result<(), ReportSinkError> {
        Ok(())
    }
}

/// Collects records in memory; cloned handles share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReportSink {
    records: Arc<Mutex<Vec<ReportRecord>>>,
}

impl InMemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReportRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ReportSink for InMemoryReportSink {
    fn append(&self, record: &ReportRecord) -> Result<(), ReportSinkError> {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        Ok(())
    }
}
