use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClinixError>;

#[derive(Error, Debug)]
pub enum ClinixError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] ingest::IngestionError),

    #[error("Index build error: {0}")]
    IndexBuild(#[from] index::IndexBuildError),

    #[error("Index storage error: {0}")]
    IndexStore(#[from] index::IndexStoreError),

    #[error("Index query error: {0}")]
    IndexQuery(#[from] index::IndexQueryError),

    #[error("LLM error: {0}")]
    Llm(#[from] llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod diagnosis;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod prompt;
pub mod training;
