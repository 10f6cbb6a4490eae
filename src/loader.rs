//! Applying statement batches to a database.
//!
//! A [`StatementSink`] executes one rendered unit atomically and reports the id
//! generated for it. [`load_batch`] renders each unit of a batch against the
//! run's [`KeyRegistry`], executes it, and registers the ids of the rows it
//! creates so later batches can refer to them.

use crate::statement::{Batch, Domain, KeyRegistry, RenderedUnit, Resolution, Schema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Executes rendered units.
pub trait StatementSink {
    /// Run the unit's statements in order inside one transaction and commit.
    /// Returns the generated id of the inserted row, if known.
    fn execute_unit(&mut self, unit: &RenderedUnit) -> Result<Option<i64>, LoadError>;
}

/// What to do when a unit fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Record the failure and keep going. Units committed earlier stay.
    #[default]
    Continue,
    /// Stop at the first failure.
    Abort,
}

/// Loader failures
#[derive(Debug)]
pub enum LoadError {
    /// No usable connection. Never retried per unit.
    Connection(String),
    /// A statement was rejected
    Statement { statement: String, message: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Connection(msg) => write!(f, "Database connection failed: {}", msg),
            LoadError::Statement { statement, message } => {
                write!(f, "Statement failed: {} ({})", message, statement)
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// A unit that did not commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    /// Position of the unit in its batch
    pub index: usize,
    pub error: String,
}

/// Outcome of loading one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub domain: String,
    pub applied: usize,
    pub failures: Vec<UnitFailure>,
    /// References that were inserted as NULL
    pub unresolved: usize,
    pub aborted: bool,
}

impl LoadReport {
    fn new(domain: Domain) -> Self {
        Self {
            domain: domain.to_string(),
            applied: 0,
            failures: Vec::new(),
            unresolved: 0,
            aborted: false,
        }
    }
}

/// Load one batch.
///
/// Statement failures are handled according to `policy`. Connection failures
/// end the run whatever the policy.
pub fn load_batch<S: StatementSink + ?Sized>(
    sink: &mut S,
    batch: &Batch,
    schema: &Schema,
    registry: &mut KeyRegistry,
    policy: ErrorPolicy,
) -> Result<LoadReport, LoadError> {
    let mut report = LoadReport::new(batch.domain);

    for (index, unit) in batch.units.iter().enumerate() {
        let rendered = unit.render(schema, Resolution::Resolved(registry));
        if rendered.unresolved > 0 {
            tracing::debug!(
                "{} unit {}: {} unresolved reference(s)",
                batch.domain,
                index,
                rendered.unresolved
            );
        }

        match sink.execute_unit(&rendered) {
            Ok(id) => {
                report.applied += 1;
                report.unresolved += rendered.unresolved;
                if let (Some(key), Some(id)) = (rendered.creates, id) {
                    registry.register(key, id);
                }
            }
            Err(LoadError::Connection(msg)) => return Err(LoadError::Connection(msg)),
            Err(err) => {
                tracing::warn!("{} unit {}: {}", batch.domain, index, err);
                report.failures.push(UnitFailure {
                    index,
                    error: err.to_string(),
                });
                if policy == ErrorPolicy::Abort {
                    report.aborted = true;
                    break;
                }
            }
        }
    }

    tracing::info!(
        "Loaded {}: {} applied, {} failed",
        batch.domain,
        report.applied,
        report.failures.len()
    );
    Ok(report)
}

/// Sink that executes nothing. Ids are allocated sequentially per table, the
/// way an auto-increment key would be on an empty table.
#[derive(Debug, Default)]
pub struct DryRunSink {
    next_ids: HashMap<&'static str, i64>,
    executed: Vec<String>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement received, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

impl StatementSink for DryRunSink {
    fn execute_unit(&mut self, unit: &RenderedUnit) -> Result<Option<i64>, LoadError> {
        self.executed.extend(unit.statements.iter().cloned());
        let next = self.next_ids.entry(unit.table).or_insert(0);
        *next += 1;
        Ok(Some(*next))
    }
}
