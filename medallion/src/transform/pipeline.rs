//! Orchestration: Bronze → Silver → Gold, then the run report.
//!
//! A [`RunContext`] is threaded through the run. Each stage returns its
//! output plus a [`StageResult`], which the caller folds into the context.
//! A stage's tables are written only once the whole stage has succeeded,
//! so an aborted Silver leaves no Silver or Gold artifacts.
//!
//! # Example
//!
//! ```rust,ignore
//! use medallion::{run_pipeline, PipelineOptions};
//!
//! let run = run_pipeline(&PipelineOptions::from_env())?;
//! println!("success: {}", run.report.success);
//! ```

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

use super::silver::SilverTables;
use super::gold::{GoldTables, CUSTOMER_STATS, DAILY_SALES};
use super::{bronze, gold, silver};
use crate::config::PipelineOptions;
use crate::error::{PipelineError, PipelineResult, StorageResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::models::Layer;
use crate::parser::{load_csv_file, RawTable, RawTables, CUSTOMERS, ORDERS, ORDER_ITEMS};
use crate::report::{Anomaly, RunReport, StageReport, StageResult};
use crate::storage::{columnar, Dataset, MemorySink, ParquetSink, TableSink};

// =============================================================================
// Run context
// =============================================================================

/// Mutable state of one run, passed explicitly into each stage call.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub timestamp_format: String,
    stages: Vec<StageResult>,
}

impl RunContext {
    pub fn new(timestamp_format: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            timestamp_format: timestamp_format.into(),
            stages: Vec::new(),
        }
    }

    /// Record a finished stage and log its summary.
    pub fn fold(&mut self, result: StageResult) {
        log_stage(&result);
        self.stages.push(result);
    }

    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.stages.iter().flat_map(|s| s.anomalies.iter().cloned()).collect()
    }

    /// Close the run. `error` is the fatal error that aborted it, if any.
    pub fn finish(&self, error: Option<&PipelineError>) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            success: error.is_none(),
            error: error.map(|e| e.to_string()),
            stages: self.stages.iter().map(StageReport::from).collect(),
            anomalies: self.anomalies(),
        }
    }
}

fn log_stage(result: &StageResult) {
    log_success(format!("{} stage done in {} ms", result.stage, result.duration.as_millis()));
    for table in &result.tables {
        log_info_indent(
            format!(
                "{}: {} in, {} out, {} rejected",
                table.table, table.input_rows, table.output_rows, table.rejected_rows
            ),
            1,
        );
        for (reason, count) in &table.rejections {
            log_info_indent(format!("{}: {}", reason, count), 2);
        }
    }
    for anomaly in &result.anomalies {
        log_warning_indent(format!("{}: {}", anomaly.table, anomaly.detail), 1);
    }
}

// =============================================================================
// Stage persistence
// =============================================================================

/// Tables produced by a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub silver: SilverTables,
    pub gold: GoldTables,
}

fn write_all(sink: &mut dyn TableSink, batches: Vec<(Dataset, RecordBatch)>) -> StorageResult<()> {
    for (dataset, batch) in &batches {
        sink.write(dataset, batch)?;
    }
    Ok(())
}

fn persist_silver(silver: &SilverTables, sink: &mut dyn TableSink) -> StorageResult<()> {
    let batches = vec![
        (Dataset::new(Layer::Silver, ORDERS), columnar::orders_batch(&silver.orders)?),
        (Dataset::new(Layer::Silver, ORDER_ITEMS), columnar::order_items_batch(&silver.order_items)?),
        (Dataset::new(Layer::Silver, CUSTOMERS), columnar::customers_batch(&silver.customers)?),
    ];
    write_all(sink, batches)
}

fn persist_gold(gold: &GoldTables, sink: &mut dyn TableSink) -> StorageResult<()> {
    let batches = vec![
        (Dataset::new(Layer::Gold, DAILY_SALES), columnar::daily_sales_batch(&gold.daily_sales)?),
        (Dataset::new(Layer::Gold, CUSTOMER_STATS), columnar::customer_stats_batch(&gold.customer_stats)?),
    ];
    write_all(sink, batches)
}

// =============================================================================
// Entry points
// =============================================================================

/// Run all three stages over already-loaded raw tables.
pub fn run_tables(raw: &RawTables, sink: &mut dyn TableSink, ctx: &mut RunContext) -> PipelineResult<PipelineOutput> {
    log_info("Bronze: snapshotting raw tables...");
    let result = bronze::run(raw, sink)?;
    ctx.fold(result);

    log_info("Silver: cleaning and deduplicating...");
    let (silver, result) = silver::run(raw, &ctx.timestamp_format)?;
    persist_silver(&silver, sink)?;
    ctx.fold(result);

    log_info("Gold: computing metrics...");
    let (gold, result) = gold::run(&silver);
    persist_gold(&gold, sink)?;
    ctx.fold(result);

    Ok(PipelineOutput { silver, gold })
}

fn load_source(name: &str, path: &Path) -> PipelineResult<RawTable> {
    if !path.is_file() {
        return Err(PipelineError::MissingTable(format!("{} ({})", name, path.display())));
    }
    let loaded = load_csv_file(name, path)?;
    log_info_indent(
        format!(
            "{}: {} rows, encoding {}, delimiter '{}'",
            name,
            loaded.table.len(),
            loaded.encoding,
            format_delimiter(loaded.delimiter)
        ),
        1,
    );
    Ok(loaded.table)
}

/// Load the three raw exports named by `options`.
pub fn load_sources(options: &PipelineOptions) -> PipelineResult<RawTables> {
    log_info(format!("Reading raw sources from {}", options.source_dir.display()));
    Ok(RawTables {
        orders: load_source(ORDERS, &options.orders_path())?,
        order_items: load_source(ORDER_ITEMS, &options.order_items_path())?,
        customers: load_source(CUSTOMERS, &options.customers_path())?,
    })
}

/// A finished run: its report and, on success, the Silver and Gold tables.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub report: RunReport,
    pub output: Option<PipelineOutput>,
}

/// Load, transform, persist and report.
///
/// Stage failures do not surface as `Err`: they end the run with
/// `report.success == false`. The report is written to
/// `options.report_path` either way, unless `options.dry_run` is set, in
/// which case nothing touches the disk. `Err` means the report itself could
/// not be written.
pub fn run_pipeline(options: &PipelineOptions) -> PipelineResult<PipelineRun> {
    let mut ctx = RunContext::new(options.timestamp_format.as_str());
    log_info(format!("Starting run {}", ctx.run_id));

    let outcome = load_sources(options).and_then(|raw| {
        if options.dry_run {
            run_tables(&raw, &mut MemorySink::new(), &mut ctx)
        } else {
            run_tables(&raw, &mut ParquetSink::new(&options.data_dir), &mut ctx)
        }
    });

    let (report, output) = match outcome {
        Ok(output) => (ctx.finish(None), Some(output)),
        Err(e) => {
            log_error(format!("Run aborted: {}", e));
            (ctx.finish(Some(&e)), None)
        }
    };

    for anomaly in &report.anomalies {
        log_warning(format!("Anomaly in {}/{}: {}", anomaly.stage, anomaly.table, anomaly.detail));
    }

    if !options.dry_run {
        report.write(&options.report_path)?;
        log_info(format!("Report written to {}", options.report_path.display()));
    }

    if report.success {
        log_success(format!("Run {} finished", report.run_id));
    }

    Ok(PipelineRun { report, output })
}

/// Printable form of a delimiter.
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
