//! Error types for the medallion pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`LoadError`] - Raw CSV loading errors
//! - [`SchemaError`] - Structural mismatches between a raw table and its declared schema
//! - [`StorageError`] - Columnar encoding and writing errors
//! - [`ReportError`] - Run report serialization and schema errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Malformed *rows* are never errors: they are dropped and counted as
//! [`crate::models::RejectReason`]s. Only structural problems surface here.

use thiserror::Error;

use crate::models::Layer;

// =============================================================================
// CSV Loading Errors
// =============================================================================

/// Errors while reading a raw CSV source.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid CSV format.
    #[error("Invalid CSV format in '{table}': {message}")]
    Parse { table: String, message: String },

    /// Empty file.
    #[error("CSV source '{0}' is empty")]
    EmptyFile(String),

    /// No headers found.
    #[error("No headers found in CSV source '{0}'")]
    NoHeaders(String),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Structural mismatch between a raw table and the columns a stage needs.
///
/// Always fatal: the run aborts and no artifact of the failing stage is written.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Required column is absent from the table.
    #[error("{stage} stage: table '{table}' is missing required column '{column}'")]
    MissingColumn {
        stage: Layer,
        table: String,
        column: String,
    },

    /// The same column name appears twice in the header row.
    #[error("{stage} stage: table '{table}' declares column '{column}' more than once")]
    DuplicateColumn {
        stage: Layer,
        table: String,
        column: String,
    },
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors from the columnar storage writer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Arrow array or batch construction failed.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding failed.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// IO error.
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Report Errors
// =============================================================================

/// Errors while serializing or checking a run report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report does not satisfy the embedded report schema.
    #[error("Run report failed schema validation: {errors:?}")]
    SchemaViolation { errors: Vec<String> },

    /// JSON error.
    #[error("Report JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("Report IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_tables`].
/// It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raw source loading error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Schema mismatch.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Report error.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// A raw table expected by the pipeline was not supplied.
    #[error("Raw table '{0}' was not supplied")]
    MissingTable(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for schema checks.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
