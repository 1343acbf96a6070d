// Language model collaborators
// Embedding and completion seams, plus the OpenAI-compatible HTTP client

pub mod openai;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use openai::OpenAiClient;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    #[error("API key not found: environment variable {0} is not set")]
    MissingApiKey(String),

    /// The endpoint for this call convention is absent or answers in a
    /// different shape, so the next convention may still work
    #[error("{convention} call shape not supported: {detail}")]
    ShapeMismatch {
        convention: CallConvention,
        detail: String,
    },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    #[inline]
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }
}

/// The two request/response conventions a completion can be issued with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallConvention {
    /// `POST chat/completions` with role-tagged messages
    ChatCompletions,
    /// `POST completions` with a single flattened prompt
    LegacyCompletions,
}

impl CallConvention {
    #[inline]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat/completions",
            Self::LegacyCompletions => "completions",
        }
    }
}

impl fmt::Display for CallConvention {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChatCompletions => f.write_str("chat-completions"),
            Self::LegacyCompletions => f.write_str("legacy-completions"),
        }
    }
}

/// A single prompt sent to a completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
}

/// Computes embedding vectors for text
pub trait Embedder {
    fn model_name(&self) -> &str;

    /// Embed every text, returning vectors in input order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_documents(&[text.to_string()])?
            .pop()
            .ok_or_else(|| LlmError::InvalidResponse("no embedding returned".to_string()))
    }
}

/// Issues text completions using a given call convention
pub trait CompletionBackend {
    fn complete(
        &self,
        convention: CallConvention,
        request: &CompletionRequest,
    ) -> Result<String, LlmError>;
}
