// Chat session
// Conversation state owned by the caller and threaded through each turn

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::diagnosis::{DiagnosisService, MedicationAdvice, MedicationRecommender, should_recommend};
use crate::prompt::{Language, detect_language};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    /// Interface language, used for the greeting
    pub language: Language,
    pub history: Vec<ChatTurn>,
    pub current_diagnosis: Option<String>,
    pub recommended_medications: Option<MedicationAdvice>,
}

impl ChatSession {
    /// Start a conversation with the assistant's greeting
    #[inline]
    pub fn new(language: Language) -> Self {
        Self {
            language,
            history: vec![ChatTurn::assistant(language.greeting())],
            current_diagnosis: None,
            recommended_medications: None,
        }
    }
}

/// Drives one conversation turn: diagnosis, then advice when a diagnosis was given
pub struct Assistant<'a> {
    diagnosis: &'a DiagnosisService<'a>,
    recommender: &'a MedicationRecommender<'a>,
}

impl<'a> Assistant<'a> {
    #[inline]
    pub fn new(
        diagnosis: &'a DiagnosisService<'a>,
        recommender: &'a MedicationRecommender<'a>,
    ) -> Self {
        Self {
            diagnosis,
            recommender,
        }
    }

    /// Answer one message and return the updated session.
    ///
    /// Blank input leaves the session untouched. The reply language follows
    /// the message, not the session. A recommendation is only requested when
    /// the reply contains a preliminary-diagnosis section; otherwise the
    /// previous recommendation is kept.
    #[inline]
    pub fn handle_user_input(&self, mut session: ChatSession, input: &str) -> ChatSession {
        let input = input.trim();
        if input.is_empty() {
            return session;
        }

        session.history.push(ChatTurn::user(input));

        let language = detect_language(input);
        debug!("Handling chat input in {}", language);

        let result = self.diagnosis.get_diagnosis(input, language);
        session
            .history
            .push(ChatTurn::assistant(result.diagnosis.as_str()));

        if should_recommend(&result.diagnosis) {
            session.recommended_medications =
                Some(self.recommender.recommend(&result.diagnosis, language));
        }
        session.current_diagnosis = Some(result.diagnosis);

        session
    }
}
