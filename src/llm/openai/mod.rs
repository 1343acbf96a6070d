#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{CallConvention, CompletionBackend, CompletionRequest, Embedder, LlmError};
use crate::config::LlmConfig;

const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// Blocking client for an OpenAI-compatible HTTP API
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    batch_size: u32,
    agent: ureq::Agent,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("embedding_model", &self.embedding_model)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct LegacyCompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct LegacyCompletionResponse {
    choices: Vec<LegacyChoice>,
}

#[derive(Debug, Deserialize)]
struct LegacyChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl OpenAiClient {
    /// Create a client, reading the API key from the configured environment variable
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = config
            .api_url()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            embedding_model: config.embedding_model.clone(),
            batch_size: config.embedding_batch_size.max(1),
            agent: build_agent(config.timeout_seconds.map(Duration::from_secs)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(Some(timeout));
        self
    }

    /// Embed one batch of texts with a single request
    #[inline]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("embeddings")?;
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let (status, body) = self.post_json(&url, &request)?;
        if status != 200 {
            return Err(status_error(None, status, &body));
        }

        let response: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse embedding response: {}", e))
        })?;

        if response.data.len() != texts.len() {
            return Err(LlmError::InvalidResponse(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(LlmError::InvalidResponse(
                "Embedding indices do not cover the request".to_string(),
            ));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Issue a request using the chat-completions convention
    #[inline]
    pub fn chat_completion(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let convention = CallConvention::ChatCompletions;
        let url = self.endpoint(convention.endpoint())?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
        };

        let (status, text) = self.post_json(&url, &body)?;
        if status != 200 {
            return Err(status_error(Some(convention), status, &text));
        }

        let response: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::ShapeMismatch {
                convention,
                detail: format!("unexpected response body: {}", e),
            })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("completion contained no choices".to_string())
        })?;

        non_empty(choice.message.content.unwrap_or_default())
    }

    /// Issue a request using the legacy single-prompt completions convention
    #[inline]
    pub fn legacy_completion(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let convention = CallConvention::LegacyCompletions;
        let url = self.endpoint(convention.endpoint())?;

        let prompt = match request.system.as_deref() {
            Some(system) => format!("{}\n\n{}", system, request.prompt),
            None => request.prompt.clone(),
        };

        let body = LegacyCompletionRequest {
            model: &request.model,
            prompt,
            temperature: request.temperature,
        };

        let (status, text) = self.post_json(&url, &body)?;
        if status != 200 {
            return Err(status_error(Some(convention), status, &text));
        }

        let response: LegacyCompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::ShapeMismatch {
                convention,
                detail: format!("unexpected response body: {}", e),
            })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("completion contained no choices".to_string())
        })?;

        non_empty(choice.text)
    }

    fn endpoint(&self, path: &str) -> Result<Url, LlmError> {
        self.base_url
            .join(path)
            .map_err(|e| LlmError::InvalidRequest(format!("Failed to build {} URL: {}", path, e)))
    }

    fn post_json<T: Serialize>(&self, url: &Url, body: &T) -> Result<(u16, String), LlmError> {
        let request_json = serde_json::to_string(body)
            .map_err(|e| LlmError::InvalidRequest(format!("Failed to serialize request: {}", e)))?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send(&request_json)
            .map_err(|e| {
                warn!("Transport error talking to {}: {}", url, e);
                LlmError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| LlmError::Transport(format!("Failed to read response body: {}", e)))?;

        debug!("Response status {} from {}", status, url);
        Ok((status, text))
    }
}

impl Embedder for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to stay under the request size limit
        for chunk in texts.chunks(self.batch_size as usize) {
            results.extend(self.embed_batch(chunk)?);
        }

        info!(
            "Generated {} embeddings with {}",
            results.len(),
            self.embedding_model
        );
        Ok(results)
    }
}

impl CompletionBackend for OpenAiClient {
    fn complete(
        &self,
        convention: CallConvention,
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        match convention {
            CallConvention::ChatCompletions => self.chat_completion(request),
            CallConvention::LegacyCompletions => self.legacy_completion(request),
        }
    }
}

fn build_agent(timeout: Option<Duration>) -> ureq::Agent {
    let builder = ureq::Agent::config_builder().http_status_as_error(false);
    let builder = match timeout {
        Some(timeout) => builder.timeout_global(Some(timeout)),
        None => builder,
    };
    builder.build().into()
}

fn non_empty(text: String) -> Result<String, LlmError> {
    if text.trim().is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text)
    }
}

/// Classify a non-200 response.
///
/// 404 and 405 on a completion endpoint mean the convention itself is not
/// served; a missing model is an ordinary API error.
fn status_error(convention: Option<CallConvention>, status: u16, body: &str) -> LlmError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let model_missing = envelope
        .as_ref()
        .and_then(|e| e.error.code.as_ref())
        .and_then(serde_json::Value::as_str)
        == Some("model_not_found");

    let message = match envelope {
        Some(envelope) => envelope.error.message,
        None if body.trim().is_empty() => "no error details".to_string(),
        None => body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
    };

    match convention {
        Some(convention) if matches!(status, 404 | 405) && !model_missing => {
            LlmError::ShapeMismatch {
                convention,
                detail: format!("HTTP {}: {}", status, message),
            }
        }
        _ => LlmError::Api { status, message },
    }
}
