
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::{CallConvention, CompletionBackend, CompletionRequest, LlmError};
use crate::prompt::{self, Language};

/// Conventions tried when none are configured explicitly
pub const DEFAULT_CONVENTIONS: [CallConvention; 2] = [
    CallConvention::ChatCompletions,
    CallConvention::LegacyCompletions,
];

#[derive(Debug, Clone, PartialEq)]
pub enum MedicationAdvice {
    Recommended(String),
    /// Every attempt failed; `errors` holds one entry per attempted convention
    Failed {
        message: String,
        errors: Vec<LlmError>,
    },
}

impl MedicationAdvice {
    /// Text to show the user, either the advice or the localized failure
    #[inline]
    pub fn text(&self) -> &str {
        match self {
            Self::Recommended(text) => text,
            Self::Failed { message, .. } => message,
        }
    }

    #[inline]
    pub fn is_recommended(&self) -> bool {
        matches!(self, Self::Recommended(_))
    }

    #[inline]
    pub fn into_text(self) -> String {
        match self {
            Self::Recommended(text) => text,
            Self::Failed { message, .. } => message,
        }
    }
}

/// True when a diagnosis contains a preliminary-diagnosis section in either language
#[inline]
pub fn should_recommend(diagnosis: &str) -> bool {
    [Language::En, Language::Zh]
        .into_iter()
        .any(|language| diagnosis.contains(prompt::diagnosis_label(language)))
}

/// Second-stage call that turns a diagnosis into over-the-counter guidance
pub struct MedicationRecommender<'a> {
    backend: &'a dyn CompletionBackend,
    model: String,
    temperature: f32,
    conventions: Vec<CallConvention>,
}

impl<'a> MedicationRecommender<'a> {
    #[inline]
    pub fn new(backend: &'a dyn CompletionBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: 0.3,
            conventions: DEFAULT_CONVENTIONS.to_vec(),
        }
    }

    #[inline]
    pub fn from_config(backend: &'a dyn CompletionBackend, config: &LlmConfig) -> Self {
        Self::new(backend, config.chat_model.as_str())
            .with_temperature(config.recommendation_temperature)
    }

    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replace the ordered list of call conventions to try
    #[inline]
    pub fn with_conventions(mut self, conventions: Vec<CallConvention>) -> Self {
        self.conventions = conventions;
        self
    }

    #[inline]
    pub fn conventions(&self) -> &[CallConvention] {
        &self.conventions
    }

    /// Ask for medication guidance, trying each call convention in order.
    ///
    /// Only a shape mismatch moves on to the next convention; any other
    /// error ends the attempt.
    #[inline]
    pub fn recommend(&self, diagnosis: &str, language: Language) -> MedicationAdvice {
        let prompt = prompt::compose_medication(language, diagnosis);
        let request = CompletionRequest {
            model: self.model.clone(),
            system: Some(prompt.system),
            prompt: prompt.user,
            temperature: self.temperature,
        };

        let mut errors = Vec::new();
        for &convention in &self.conventions {
            debug!("Requesting medication advice via {}", convention);
            match self.backend.complete(convention, &request) {
                Ok(text) if !text.trim().is_empty() => return MedicationAdvice::Recommended(text),
                Ok(_) => {
                    errors.push(LlmError::EmptyResponse);
                    break;
                }
                Err(error) if error.is_shape_mismatch() => {
                    warn!("{}; trying next call convention", error);
                    errors.push(error);
                }
                Err(error) => {
                    errors.push(error);
                    break;
                }
            }
        }

        if errors.is_empty() {
            errors.push(LlmError::InvalidRequest(
                "no call conventions configured".to_string(),
            ));
        }

        let message = failure_message(language, &errors);
        warn!("Medication recommendation failed: {}", message);
        MedicationAdvice::Failed { message, errors }
    }

    /// Plain-text form of [`MedicationRecommender::recommend`]
    #[inline]
    pub fn recommend_text(&self, diagnosis: &str, language: Language) -> String {
        self.recommend(diagnosis, language).into_text()
    }
}

fn failure_message(language: Language, errors: &[LlmError]) -> String {
    let prefix = language.medication_error_prefix();
    match errors {
        [] => prefix.to_string(),
        [only] => format!("{}{}", prefix, only),
        [first, .., last] => format!("{}{} (fallback: {})", prefix, first, last),
    }
}
