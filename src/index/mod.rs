// Embedding index
// Exact nearest-neighbour search over embedded passages, with a seed fallback


pub mod persist;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::ingest::{self, IngestionError, Passage};
use crate::llm::{Embedder, LlmError};

pub use persist::{INDEX_FILE_NAME, IndexStoreError};

/// Passages indexed when the records dataset cannot be used
pub const SEED_PASSAGES: [&str; 3] = [
    "Common cold: Symptoms include runny nose, sneezing, sore throat, and cough.",
    "Influenza: Symptoms include fever, body aches, fatigue, and respiratory symptoms.",
    "Hypertension: High blood pressure, often asymptomatic but can cause headaches.",
];

#[derive(Debug, Error)]
pub enum IndexBuildError {
    #[error("No passages to index")]
    NoPassages,
    #[error("Failed to embed passages: {0}")]
    Embedding(#[from] LlmError),
    #[error("Embedding count mismatch: {passages} passages but {vectors} vectors")]
    CountMismatch { passages: usize, vectors: usize },
    #[error("Passage {position} has dimension {actual}, expected {expected}")]
    InconsistentDimension {
        position: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Embedding backend returned zero-length vectors")]
    EmptyVector,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexQueryError {
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] LlmError),
    #[error("Query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Where the indexed passages came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrigin {
    Dataset,
    Seed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub passage: Passage,
    pub vector: Vec<f32>,
}

/// A passage returned by a query together with its cosine similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPassage<'a> {
    pub passage: &'a Passage,
    pub score: f32,
}

/// Immutable set of embedded passages.
///
/// Every vector has the same dimension. The index is never mutated after
/// construction; a new one is built to pick up new data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
    embedding_model: String,
    origin: IndexOrigin,
    built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Embed the passages and index them as dataset passages
    #[inline]
    pub fn build(passages: Vec<Passage>, embedder: &dyn Embedder) -> Result<Self, IndexBuildError> {
        Self::build_with_origin(passages, embedder, IndexOrigin::Dataset)
    }

    /// Index the built-in seed passages
    #[inline]
    pub fn build_seed(embedder: &dyn Embedder) -> Result<Self, IndexBuildError> {
        let passages = SEED_PASSAGES
            .iter()
            .enumerate()
            .map(|(row, text)| Passage::new(*text, row + 1, 0))
            .collect();
        Self::build_with_origin(passages, embedder, IndexOrigin::Seed)
    }

    /// Build over the ingested passages, falling back to the seed set when
    /// ingestion or the dataset build fails.
    ///
    /// An error is only returned when the seed build fails as well.
    #[inline]
    pub fn build_with_fallback(
        ingested: Result<Vec<Passage>, IngestionError>,
        embedder: &dyn Embedder,
    ) -> Result<Self, IndexBuildError> {
        match ingested {
            Ok(passages) => match Self::build(passages, embedder) {
                Ok(index) => return Ok(index),
                Err(e) => warn!("Failed to build index over records: {}", e),
            },
            Err(e) => warn!("Failed to ingest records: {}", e),
        }

        warn!("Falling back to {} seed passages", SEED_PASSAGES.len());
        Self::build_seed(embedder)
    }

    /// Load the saved index, or ingest the records and build a fresh one.
    ///
    /// The saved index is only reused when `index.reuse_saved` is set, the
    /// caller did not ask for a rebuild, and it was embedded with the same
    /// model. A freshly built index is saved back to `index.dir`; a failed
    /// save is logged and does not fail the build.
    #[inline]
    pub fn open_or_build(
        config: &Config,
        embedder: &dyn Embedder,
        force_rebuild: bool,
    ) -> Result<Self, IndexBuildError> {
        let dir = &config.index.dir;

        if config.index.reuse_saved && !force_rebuild {
            match Self::load(dir) {
                Ok(index) if index.embedding_model == embedder.model_name() => {
                    info!(
                        "Loaded saved index with {} entries from {}",
                        index.len(),
                        dir.display()
                    );
                    return Ok(index);
                }
                Ok(index) => warn!(
                    "Saved index was embedded with {}, not {}; rebuilding",
                    index.embedding_model,
                    embedder.model_name()
                ),
                Err(e) => warn!("Could not load saved index: {}; rebuilding", e),
            }
        }

        let ingested = ingest::load_and_chunk(&config.data.records_path, &config.chunking);
        let index = Self::build_with_fallback(ingested, embedder)?;

        if let Err(e) = index.save(dir) {
            warn!("Failed to save index to {}: {}", dir.display(), e);
        }

        Ok(index)
    }

    fn build_with_origin(
        passages: Vec<Passage>,
        embedder: &dyn Embedder,
        origin: IndexOrigin,
    ) -> Result<Self, IndexBuildError> {
        if passages.is_empty() {
            return Err(IndexBuildError::NoPassages);
        }

        debug!("Embedding {} passages", passages.len());
        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let vectors = embedder.embed_documents(&texts)?;

        if vectors.len() != passages.len() {
            return Err(IndexBuildError::CountMismatch {
                passages: passages.len(),
                vectors: vectors.len(),
            });
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(IndexBuildError::EmptyVector);
        }

        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, vector)| vector.len() != dimension)
        {
            return Err(IndexBuildError::InconsistentDimension {
                position,
                expected: dimension,
                actual: vector.len(),
            });
        }

        let entries: Vec<IndexEntry> = passages
            .into_iter()
            .zip(vectors)
            .map(|(passage, vector)| IndexEntry { passage, vector })
            .collect();

        info!(
            "Built {:?} index with {} entries of dimension {}",
            origin,
            entries.len(),
            dimension
        );

        Ok(Self {
            entries,
            dimension,
            embedding_model: embedder.model_name().to_string(),
            origin,
            built_at: Utc::now(),
        })
    }

    /// Embed `text` and return the `k` most similar passages
    #[inline]
    pub fn query(
        &self,
        text: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<ScoredPassage<'_>>, IndexQueryError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = embedder.embed_query(text)?;
        self.nearest(&vector, k)
    }

    /// Rank every entry against `vector`, highest similarity first.
    ///
    /// Ties keep insertion order.
    #[inline]
    pub fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPassage<'_>>, IndexQueryError> {
        if vector.len() != self.dimension {
            return Err(IndexQueryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<ScoredPassage<'_>> = self
            .entries
            .iter()
            .map(|entry| ScoredPassage {
                passage: &entry.passage,
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[inline]
    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    #[inline]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Zero-norm vectors score 0 against everything
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
