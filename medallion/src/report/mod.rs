//! Run report: per-stage row counts, rejections, timing and anomalies.
//!
//! Stages hand back a [`StageResult`]; the orchestrator folds those into a
//! [`RunReport`], which is serialized once at the end of the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ReportError, ReportResult};
use crate::models::{Layer, RejectReason};
use crate::validation::validate_run_report;

// =============================================================================
// Rejection counting
// =============================================================================

/// Running per-reason count of dropped rows for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RejectionTally(BTreeMap<RejectReason, usize>);

impl RejectionTally {
    pub fn reject(&mut self, reason: RejectReason) {
        self.add(reason, 1);
    }

    pub fn add(&mut self, reason: RejectReason, count: usize) {
        if count > 0 {
            *self.0.entry(reason).or_default() += count;
        }
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn get(&self, reason: RejectReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }
}

// =============================================================================
// Stage results
// =============================================================================

/// Row accounting for one table produced by a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub input_rows: usize,
    pub output_rows: usize,
    pub rejected_rows: usize,
    /// Breakdown of `rejected_rows` by reason.
    pub rejections: BTreeMap<RejectReason, usize>,
}

impl TableReport {
    pub fn new(table: impl Into<String>, input_rows: usize, output_rows: usize, tally: RejectionTally) -> Self {
        Self {
            table: table.into(),
            input_rows,
            output_rows,
            rejected_rows: tally.total(),
            rejections: tally.0,
        }
    }

    pub fn rejected(&self, reason: RejectReason) -> usize {
        self.rejections.get(&reason).copied().unwrap_or(0)
    }
}

/// Kind of condition worth an operator's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// A table came out empty from non-empty input.
    EmptyResult,
    /// Orders reference customers absent from the cleaned customer table.
    OrphanedCustomers,
}

/// A non-fatal condition recorded in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub stage: Layer,
    pub table: String,
    pub detail: String,
}

/// What a stage hands back to the orchestrator alongside its output tables.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Layer,
    pub tables: Vec<TableReport>,
    pub duration: Duration,
    pub anomalies: Vec<Anomaly>,
}

impl StageResult {
    /// Build a stage result, flagging every table emptied by the stage.
    pub fn new(stage: Layer, tables: Vec<TableReport>, duration: Duration) -> Self {
        let anomalies = tables
            .iter()
            .filter(|t| t.input_rows > 0 && t.output_rows == 0)
            .map(|t| Anomaly {
                kind: AnomalyKind::EmptyResult,
                stage,
                table: t.table.clone(),
                detail: format!("{} input rows produced no output rows", t.input_rows),
            })
            .collect();

        Self {
            stage,
            tables,
            duration,
            anomalies,
        }
    }

    pub fn with_anomaly(mut self, anomaly: Anomaly) -> Self {
        self.anomalies.push(anomaly);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Serialized form of a stage in the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Layer,
    pub input_rows: usize,
    pub output_rows: usize,
    pub rejected_rows: usize,
    pub duration_ms: u64,
    pub tables: Vec<TableReport>,
}

impl From<&StageResult> for StageReport {
    fn from(result: &StageResult) -> Self {
        Self {
            stage: result.stage,
            input_rows: result.tables.iter().map(|t| t.input_rows).sum(),
            output_rows: result.tables.iter().map(|t| t.output_rows).sum(),
            rejected_rows: result.tables.iter().map(|t| t.rejected_rows).sum(),
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            tables: result.tables.clone(),
        }
    }
}

// =============================================================================
// Run report
// =============================================================================

/// Summary of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    /// Fatal error that aborted the run.
    pub error: Option<String>,
    pub stages: Vec<StageReport>,
    pub anomalies: Vec<Anomaly>,
}

impl RunReport {
    pub fn stage(&self, stage: Layer) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Serialize to pretty JSON after checking the embedded report schema.
    pub fn to_json(&self) -> ReportResult<String> {
        let value = serde_json::to_value(self)?;
        validate_run_report(&value).map_err(|errors| ReportError::SchemaViolation { errors })?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Write the report to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> ReportResult<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }
}
