// Document ingestion
// Loads the medical-records table and turns each row into retrievable passages


pub mod chunking;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub use chunking::{ChunkingConfig, split_text};

pub const CONDITION_COLUMN: &str = "Medical Condition";
pub const NOTES_COLUMN: &str = "Doctor's Notes";
pub const TREATMENTS_COLUMN: &str = "Treatments";

const REQUIRED_COLUMNS: [&str; 3] = [CONDITION_COLUMN, NOTES_COLUMN, TREATMENTS_COLUMN];

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Records file not found: {0}")]
    NotFound(PathBuf),
    #[error("Malformed records file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Records file {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
    #[error("Records file {0} produced no passages")]
    Empty(PathBuf),
}

/// A unit of retrievable text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    /// 1-based data row the passage was cut from
    pub source_row: usize,
    /// Position of this chunk within its row
    pub chunk_index: usize,
}

impl Passage {
    #[inline]
    pub fn new(content: impl Into<String>, source_row: usize, chunk_index: usize) -> Self {
        Self {
            content: content.into(),
            source_row,
            chunk_index,
        }
    }
}

/// One row of the records table, columns kept in header order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalRecord {
    pub row: usize,
    pub fields: Vec<(String, String)>,
}

impl MedicalRecord {
    #[inline]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    #[inline]
    pub fn condition(&self) -> &str {
        self.get(CONDITION_COLUMN).unwrap_or_default()
    }

    #[inline]
    pub fn notes(&self) -> &str {
        self.get(NOTES_COLUMN).unwrap_or_default()
    }

    #[inline]
    pub fn treatments(&self) -> &str {
        self.get(TREATMENTS_COLUMN).unwrap_or_default()
    }
}

/// Read every row of the records CSV.
///
/// Values are trimmed. The three clinical columns must be present in the
/// header; all other columns are carried along untouched.
#[inline]
pub fn load_records(path: &Path) -> Result<Vec<MedicalRecord>, IngestionError> {
    if !path.is_file() {
        return Err(IngestionError::NotFound(path.to_path_buf()));
    }

    let csv_error = |source| IngestionError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(IngestionError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.map_err(csv_error)?;
        let fields = headers
            .iter()
            .cloned()
            .zip(row.iter().map(str::to_string))
            .collect();
        records.push(MedicalRecord { row: i + 1, fields });
    }

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Render a record as `column: value` lines, skipping empty values
#[inline]
pub fn record_to_document(record: &MedicalRecord) -> String {
    record
        .fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Chunk already-loaded records into passages
#[inline]
pub fn chunk_records(records: &[MedicalRecord], config: &ChunkingConfig) -> Vec<Passage> {
    records
        .iter()
        .flat_map(|record| {
            let document = record_to_document(record);
            split_text(&document, config)
                .into_iter()
                .enumerate()
                .map(move |(chunk_index, content)| Passage::new(content, record.row, chunk_index))
        })
        .collect()
}

/// Load the records file and split it into passages
#[inline]
pub fn load_and_chunk(path: &Path, config: &ChunkingConfig) -> Result<Vec<Passage>, IngestionError> {
    let records = load_records(path)?;
    let passages = chunk_records(&records, config);

    if passages.is_empty() {
        return Err(IngestionError::Empty(path.to_path_buf()));
    }

    info!(
        "Ingested {} records into {} passages from {}",
        records.len(),
        passages.len(),
        path.display()
    );
    Ok(passages)
}
