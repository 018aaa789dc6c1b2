//! JSON Schema validation for run reports.
//!
//! The report schema is embedded at compile time from
//! `schemas/run-report.json` (JSON Schema Draft 7). A report is checked
//! before it is written, and `medallion check-report` checks one on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use medallion::validation::validate;
//!
//! let schema = json!({
//!     "type": "object",
//!     "required": ["run_id"],
//!     "properties": { "run_id": { "type": "string" } }
//! });
//!
//! assert!(validate(&schema, &json!({ "run_id": "abc" })).is_ok());
//! assert!(validate(&schema, &json!({ "runId": 42 })).is_err());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static RUN_REPORT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/run-report.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick yes/no check against a schema.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate against the embedded run report schema.
pub fn validate_run_report(data: &Value) -> Result<(), Vec<String>> {
    validate(&RUN_REPORT_SCHEMA, data)
}

/// Quick check against the run report schema.
pub fn is_valid_run_report(data: &Value) -> bool {
    is_valid(&RUN_REPORT_SCHEMA, data)
}
