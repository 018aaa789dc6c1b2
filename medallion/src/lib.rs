//! # Medallion - layered batch pipeline for e-commerce exports
//!
//! Medallion turns three raw CSV exports (orders, order items, customers)
//! into cleaned tables and business metrics, persisted as Parquet per layer,
//! with a JSON run report.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV files  │────▶│   Bronze    │────▶│   Silver    │────▶│    Gold     │
//! │  (any enc)  │     │ (raw, text) │     │  (typed,    │     │ (daily +    │
//! └─────────────┘     └─────────────┘     │   clean)    │     │  customer)  │
//!                                         └─────────────┘     └─────────────┘
//!                            │                   │                   │
//!                            └─────────── run report ◀───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use medallion::{run_pipeline, PipelineOptions};
//!
//! let options = PipelineOptions::default().with_source_dir("source_data");
//! let run = run_pipeline(&options)?;
//! println!("{} daily rows", run.output.map(|o| o.gold.daily_sales.len()).unwrap_or(0));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Typed rows, money and rejection reasons
//! - [`parser`] - CSV loading with encoding and delimiter detection
//! - [`transform`] - Bronze, Silver and Gold stages plus orchestration
//! - [`storage`] - Arrow conversion and Parquet sinks
//! - [`report`] - Run report
//! - [`validation`] - Run report schema validation
//! - [`config`] - Pipeline options
//! - [`logs`] - Progress logging

// Core modules
pub mod error;
pub mod models;

// Configuration and logging
pub mod config;
pub mod logs;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Persistence
pub mod storage;

// Reporting
pub mod report;
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{LoadError, PipelineError, PipelineResult, ReportError, SchemaError, StorageError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Customer,
    CustomerStat,
    DailySalesMetric,
    Layer,
    Money,
    Order,
    OrderItem,
    OrderStatus,
    RejectReason,
    StateCode,
};

// =============================================================================
// Re-exports - CSV Loading
// =============================================================================

pub use parser::{
    load_csv_file,
    parse_bytes_auto,
    parse_csv_str,
    detect_encoding,
    detect_delimiter,
    decode_content,
    LoadedTable,
    RawTable,
    RawTables,
};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use transform::{
    clean_orders,
    clean_order_items,
    clean_customers,
    compute_daily_sales,
    compute_customer_stats,
    Cleaned,
    SilverTables,
    GoldTables,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::PipelineOptions;
pub use transform::pipeline::{load_sources, run_pipeline, run_tables, PipelineOutput, PipelineRun, RunContext};

// =============================================================================
// Re-exports - Storage and report
// =============================================================================

pub use report::{Anomaly, AnomalyKind, RunReport, StageReport, StageResult, TableReport};
pub use storage::{Dataset, MemorySink, ParquetSink, TableSink};
pub use validation::{is_valid_run_report, validate_run_report};
