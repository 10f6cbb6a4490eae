//! Per-row outcomes and per-reader reports.

use crate::entity::RowError;
use serde::Serialize;
use std::fmt;

/// What became of one source row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome<T> {
    Parsed(T),
    Skipped(RowError),
}

impl<T> From<Result<T, RowError>> for RowOutcome<T> {
    fn from(result: Result<T, RowError>) -> Self {
        match result {
            Ok(record) => RowOutcome::Parsed(record),
            Err(reason) => RowOutcome::Skipped(reason),
        }
    }
}

/// A dropped row and the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// Sheet or file name
    pub source: String,
    /// Zero-based row position in the source
    pub row: usize,
    #[serde(serialize_with = "serialize_display")]
    pub reason: RowError,
}

fn serialize_display<S: serde::Serializer>(value: &RowError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

impl fmt::Display for SkippedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.source, self.row, self.reason)
    }
}

/// Records read from one source, plus every row that was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReport<T> {
    pub domain: &'static str,
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRow>,
    /// Non-blank data rows examined
    pub rows_read: usize,
}

impl<T> ReadReport<T> {
    pub fn new(domain: &'static str) -> Self {
        Self {
            domain,
            records: Vec::new(),
            skipped: Vec::new(),
            rows_read: 0,
        }
    }

    /// Fold one row's outcome into the report.
    pub fn record(&mut self, source: &str, row: usize, outcome: RowOutcome<T>) {
        self.rows_read += 1;
        match outcome {
            RowOutcome::Parsed(record) => self.records.push(record),
            RowOutcome::Skipped(reason) => self.skip(source, row, reason),
        }
    }

    pub fn skip(&mut self, source: &str, row: usize, reason: RowError) {
        let skipped = SkippedRow {
            source: source.to_string(),
            row,
            reason,
        };
        tracing::warn!("Skipping {}", skipped);
        self.skipped.push(skipped);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "{}: {} records from {} rows ({} skipped)",
            self.domain,
            self.records.len(),
            self.rows_read,
            self.skipped.len()
        );
    }
}
