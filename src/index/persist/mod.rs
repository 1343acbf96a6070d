
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::VectorIndex;

pub const INDEX_FILE_NAME: &str = "index.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IndexStoreError {
    #[error("No saved index at {0}")]
    NotFound(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Saved index {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Saved index format version {found} is not supported")]
    UnsupportedVersion { found: u32 },
    #[error("Saved index is inconsistent: {0}")]
    Corrupt(String),
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    index: &'a VectorIndex,
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    index: VectorIndex,
}

impl VectorIndex {
    /// Write the index to `dir/index.json`, replacing any previous save
    #[inline]
    pub fn save(&self, dir: &Path) -> Result<PathBuf, IndexStoreError> {
        fs::create_dir_all(dir).map_err(|source| IndexStoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(INDEX_FILE_NAME);
        let tmp_path = dir.join(format!("{}.tmp", INDEX_FILE_NAME));
        let io_error = |source| IndexStoreError::Io {
            path: tmp_path.clone(),
            source,
        };

        let file = File::create(&tmp_path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(
            &mut writer,
            &IndexFileRef {
                format_version: FORMAT_VERSION,
                index: self,
            },
        )
        .map_err(|source| IndexStoreError::Json {
            path: tmp_path.clone(),
            source,
        })?;
        writer.flush().map_err(io_error)?;
        drop(writer);

        fs::rename(&tmp_path, &path).map_err(|source| IndexStoreError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("Saved {} index entries to {}", self.len(), path.display());
        Ok(path)
    }

    /// Read an index previously written by [`VectorIndex::save`]
    #[inline]
    pub fn load(dir: &Path) -> Result<Self, IndexStoreError> {
        let path = dir.join(INDEX_FILE_NAME);
        if !path.is_file() {
            return Err(IndexStoreError::NotFound(path));
        }

        let file = File::open(&path).map_err(|source| IndexStoreError::Io {
            path: path.clone(),
            source,
        })?;
        let stored: IndexFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| IndexStoreError::Json {
                path: path.clone(),
                source,
            })?;

        if stored.format_version != FORMAT_VERSION {
            return Err(IndexStoreError::UnsupportedVersion {
                found: stored.format_version,
            });
        }

        let index = stored.index;
        if index.entries.is_empty() {
            return Err(IndexStoreError::Corrupt("no entries".to_string()));
        }
        if let Some(position) = index
            .entries
            .iter()
            .position(|entry| entry.vector.len() != index.dimension)
        {
            return Err(IndexStoreError::Corrupt(format!(
                "entry {} does not have dimension {}",
                position, index.dimension
            )));
        }

        debug!("Loaded {} index entries from {}", index.len(), path.display());
        Ok(index)
    }
}
