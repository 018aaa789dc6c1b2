//! Bronze stage: persist the raw tables as loaded.
//!
//! Nothing is cleaned or typed here. Every column is stored as nullable
//! text in raw header order, and the load time travels as file metadata.

use arrow::record_batch::RecordBatch;
use chrono::SecondsFormat;
use std::time::Instant;

use crate::error::StorageResult;
use crate::models::Layer;
use crate::parser::RawTables;
use crate::report::{RejectionTally, StageResult, TableReport};
use crate::storage::columnar::raw_batch;
use crate::storage::{Dataset, TableSink};

/// Metadata key holding the table's load time (RFC 3339, UTC).
pub const LOADED_AT_KEY: &str = "loaded_at";

/// Snapshot every raw table into `sink`.
///
/// All batches are built before the first write, so an encoding failure
/// leaves no Bronze artifact behind.
pub fn run(raw: &RawTables, sink: &mut dyn TableSink) -> StorageResult<StageResult> {
    let started = Instant::now();

    let batches = raw
        .iter()
        .map(|table| {
            let dataset = Dataset::new(Layer::Bronze, table.name.as_str())
                .with_metadata(LOADED_AT_KEY, table.loaded_at.to_rfc3339_opts(SecondsFormat::Micros, true));
            raw_batch(table).map(|batch| (dataset, batch))
        })
        .collect::<StorageResult<Vec<(Dataset, RecordBatch)>>>()?;

    for (dataset, batch) in &batches {
        sink.write(dataset, batch)?;
    }

    let tables = raw
        .iter()
        .map(|t| TableReport::new(t.name.as_str(), t.len(), t.len(), RejectionTally::default()))
        .collect();

    Ok(StageResult::new(Layer::Bronze, tables, started.elapsed()))
}
