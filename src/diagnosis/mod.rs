// Diagnosis service
// Retrieval, prompt composition and completion behind a call that never fails


pub mod medication;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::index::{IndexQueryError, VectorIndex};
use crate::llm::{CallConvention, CompletionBackend, CompletionRequest, Embedder, LlmError};
use crate::prompt::{self, Language};

pub use medication::{MedicationAdvice, MedicationRecommender, should_recommend};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagnosisError {
    #[error("symptom description is empty")]
    EmptyInput,
    #[error(transparent)]
    Retrieval(#[from] IndexQueryError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosisOutcome {
    Answered,
    Failed(DiagnosisError),
}

/// What the assistant answered and which passages it was shown.
///
/// On failure `diagnosis` holds the localized error text and `sources` is
/// empty. Serializes to `{"diagnosis": .., "sources": [..]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisResult {
    pub diagnosis: String,
    pub sources: Vec<String>,
    #[serde(skip)]
    pub outcome: DiagnosisOutcome,
}

impl DiagnosisResult {
    #[inline]
    pub fn failed(language: Language, error: DiagnosisError) -> Self {
        Self {
            diagnosis: format!("{}{}", language.diagnosis_error_prefix(), error),
            sources: Vec::new(),
            outcome: DiagnosisOutcome::Failed(error),
        }
    }

    #[inline]
    pub fn is_answered(&self) -> bool {
        self.outcome == DiagnosisOutcome::Answered
    }

    #[inline]
    pub fn error(&self) -> Option<&DiagnosisError> {
        match &self.outcome {
            DiagnosisOutcome::Answered => None,
            DiagnosisOutcome::Failed(error) => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisSettings {
    pub model: String,
    pub temperature: f32,
    pub top_k: usize,
    pub convention: CallConvention,
}

impl DiagnosisSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.chat_model.clone(),
            temperature: config.llm.diagnosis_temperature,
            top_k: config.retrieval.top_k,
            convention: CallConvention::ChatCompletions,
        }
    }
}

impl Default for DiagnosisSettings {
    #[inline]
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct DiagnosisService<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    backend: &'a dyn CompletionBackend,
    settings: DiagnosisSettings,
}

impl<'a> DiagnosisService<'a> {
    #[inline]
    pub fn new(
        index: &'a VectorIndex,
        embedder: &'a dyn Embedder,
        backend: &'a dyn CompletionBackend,
        settings: DiagnosisSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            backend,
            settings,
        }
    }

    /// Answer a symptom description.
    ///
    /// Failures are folded into the result; this never returns an error.
    #[inline]
    pub fn get_diagnosis(&self, symptom_text: &str, language: Language) -> DiagnosisResult {
        match self.try_diagnosis(symptom_text, language) {
            Ok(result) => result,
            Err(error) => {
                warn!("Diagnosis failed: {}", error);
                DiagnosisResult::failed(language, error)
            }
        }
    }

    fn try_diagnosis(
        &self,
        symptom_text: &str,
        language: Language,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        let question = symptom_text.trim();
        if question.is_empty() {
            return Err(DiagnosisError::EmptyInput);
        }

        let retrieved = self
            .index
            .query(question, self.settings.top_k, self.embedder)?;
        debug!("Retrieved {} passages for diagnosis", retrieved.len());

        let sources: Vec<String> = retrieved
            .iter()
            .map(|scored| scored.passage.content.clone())
            .collect();
        let context: Vec<&str> = sources.iter().map(String::as_str).collect();

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            system: None,
            prompt: prompt::compose(language, &context, question),
            temperature: self.settings.temperature,
        };

        let diagnosis = self.backend.complete(self.settings.convention, &request)?;
        if diagnosis.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }

        info!(
            "Diagnosis answered in {} with {} sources",
            language,
            sources.len()
        );

        Ok(DiagnosisResult {
            diagnosis,
            sources,
            outcome: DiagnosisOutcome::Answered,
        })
    }
}
