//! Layer storage - persist Arrow record batches per layer.
//!
//! Every table a stage produces is addressed by a [`Dataset`] (layer + name)
//! and handed to a [`TableSink`]. [`ParquetSink`] writes
//! `<root>/<layer>/<name>.parquet`; [`MemorySink`] keeps batches in memory
//! for dry runs and tests.

pub mod columnar;

use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::StorageResult;
use crate::models::Layer;

/// Address of one persisted table, plus file-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub layer: Layer,
    pub name: String,
    pub metadata: BTreeMap<String, String>,
}

impl Dataset {
    pub fn new(layer: Layer, name: impl Into<String>) -> Self {
        Self {
            layer,
            name: name.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `<layer>/<name>`
    pub fn key(&self) -> String {
        format!("{}/{}", self.layer, self.name)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.name)
    }
}

/// Destination for the tables a stage produces.
pub trait TableSink {
    fn write(&mut self, dataset: &Dataset, batch: &RecordBatch) -> StorageResult<()>;
}

// =============================================================================
// Parquet
// =============================================================================

/// Writes each dataset to its own ZSTD-compressed Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    root: PathBuf,
}

impl ParquetSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, dataset: &Dataset) -> PathBuf {
        self.root
            .join(dataset.layer.as_str())
            .join(format!("{}.parquet", dataset.name))
    }

    fn properties(dataset: &Dataset) -> WriterProperties {
        let metadata: Vec<KeyValue> = dataset
            .metadata
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect();

        WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .set_key_value_metadata((!metadata.is_empty()).then_some(metadata))
            .build()
    }
}

impl TableSink for ParquetSink {
    fn write(&mut self, dataset: &Dataset, batch: &RecordBatch) -> StorageResult<()> {
        let path = self.path_for(dataset);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Readers never see a half-written file.
        let tmp = path.with_extension("parquet.tmp");
        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(Self::properties(dataset)))?;
        writer.write(batch)?;
        writer.close()?;
        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

/// Read every batch back from a Parquet file, with its key-value metadata.
pub fn read_parquet(path: &Path) -> StorageResult<(Vec<RecordBatch>, BTreeMap<String, String>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;

    let metadata = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .map(|kvs| {
            kvs.iter()
                .filter_map(|kv| kv.value.clone().map(|v| (kv.key.clone(), v)))
                .collect()
        })
        .unwrap_or_default();

    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    Ok((batches, metadata))
}

// =============================================================================
// Memory
// =============================================================================

/// Keeps written batches in memory, keyed by `<layer>/<name>`.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, (Dataset, RecordBatch)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, layer: Layer, name: &str) -> Option<&RecordBatch> {
        self.tables.get(&format!("{}/{}", layer, name)).map(|(_, b)| b)
    }

    pub fn dataset(&self, layer: Layer, name: &str) -> Option<&Dataset> {
        self.tables.get(&format!("{}/{}", layer, name)).map(|(d, _)| d)
    }

    /// Keys of every written dataset, sorted.
    pub fn keys(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableSink for MemorySink {
    fn write(&mut self, dataset: &Dataset, batch: &RecordBatch) -> StorageResult<()> {
        self.tables.insert(dataset.key(), (dataset.clone(), batch.clone()));
        Ok(())
    }
}
