//! Raw CSV loading with encoding and delimiter auto-detection.
//!
//! Turns a CSV source into a [`RawTable`]: header names plus rows of
//! optional strings. No cleaning happens here beyond mapping null tokens
//! to `None`; typed coercion lives in [`crate::transform::coerce`].

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{LoadError, LoadResult, SchemaError, SchemaResult};
use crate::models::Layer;

/// Cell values read as null, matching what pandas treats as missing.
const NULL_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Logical names of the three raw sources.
pub const ORDERS: &str = "orders";
pub const ORDER_ITEMS: &str = "order_items";
pub const CUSTOMERS: &str = "customers";

/// An untyped table exactly as read from its source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Logical table name (`orders`, `order_items`, `customers`).
    pub name: String,
    /// Column names in source order.
    pub headers: Vec<String>,
    /// One entry per data row, padded or truncated to `headers.len()`.
    pub rows: Vec<Vec<Option<String>>>,
    /// When the source was read.
    pub loaded_at: DateTime<Utc>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
            loaded_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a required column, or a [`SchemaError`] naming the stage and table.
    pub fn column(&self, stage: Layer, column: &str) -> SchemaResult<usize> {
        self.optional_column(column)
            .ok_or_else(|| SchemaError::MissingColumn {
                stage,
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Index of a column that may legitimately be absent.
    pub fn optional_column(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Reject header rows that name the same column twice.
    pub fn check_unique_headers(&self, stage: Layer) -> SchemaResult<()> {
        let mut seen = HashSet::new();
        for header in &self.headers {
            if !seen.insert(header.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    stage,
                    table: self.name.clone(),
                    column: header.clone(),
                });
            }
        }
        Ok(())
    }

    /// Cell at `(row, col)`; `None` for null cells and absent columns.
    pub fn cell(&self, row: usize, col: Option<usize>) -> Option<&str> {
        let col = col?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Build a table from string literals, applying the same null-token
    /// mapping the CSV loader does.
    #[cfg(test)]
    pub(crate) fn from_literals(name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                let mut cells: Vec<Option<String>> = row.iter().map(|c| normalize_cell(c)).collect();
                cells.resize(headers.len(), None);
                cells
            })
            .collect();
        Self::new(name, headers, rows)
    }
}

/// The three raw tables consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct RawTables {
    pub orders: RawTable,
    pub order_items: RawTable,
    pub customers: RawTable,
}

impl RawTables {
    pub fn iter(&self) -> impl Iterator<Item = &RawTable> {
        [&self.orders, &self.order_items, &self.customers].into_iter()
    }
}

/// A loaded table with the detection results used to read it.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Map a raw cell to `None` when it is blank or a null token.
pub fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_TOKENS.contains(&trimmed) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a UTF-8 string using the specified encoding.
///
/// Unknown encodings and invalid UTF-8 fall back to lossy conversion.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when none of the candidates appear.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_csv_str(name: &str, content: &str, delimiter: char) -> LoadResult<RawTable> {
    if content.trim().is_empty() {
        return Err(LoadError::EmptyFile(name.to_string()));
    }

    let parse_err = |e: csv::Error| LoadError::Parse {
        table: name.to_string(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::NoHeaders(name.to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_err)?;

        // Blank line
        if record.len() <= 1 && record.get(0).map_or(true, |v| v.trim().is_empty()) && headers.len() > 1 {
            continue;
        }

        let mut cells: Vec<Option<String>> = record.iter().take(headers.len()).map(normalize_cell).collect();
        cells.resize(headers.len(), None);
        rows.push(cells);
    }

    Ok(RawTable::new(name, headers, rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(name: &str, bytes: &[u8]) -> LoadResult<LoadedTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let table = parse_csv_str(name, &content, delimiter)?;

    Ok(LoadedTable {
        table,
        encoding,
        delimiter,
    })
}

/// Load a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let loaded = load_csv_file("orders", "source_data/olist_orders_dataset.csv")?;
/// println!("{} rows, delimiter '{}'", loaded.table.len(), loaded.delimiter);
/// ```
pub fn load_csv_file<P: AsRef<Path>>(name: &str, path: P) -> LoadResult<LoadedTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_bytes_auto(name, &bytes)
}
