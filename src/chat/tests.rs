use super::*;
use crate::diagnosis::DiagnosisSettings;
use crate::index::VectorIndex;
use crate::llm::{CallConvention, CompletionBackend, CompletionRequest, Embedder, LlmError};
use std::cell::RefCell;

struct FlatEmbedder;

impl Embedder for FlatEmbedder {
    fn model_name(&self) -> &str {
        "flat-test"
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.5]).collect())
    }
}

/// Diagnoses with the given reply and records medication requests
struct ChatBackend {
    diagnosis_reply: String,
    medication_prompts: RefCell<Vec<String>>,
}

impl ChatBackend {
    fn new(diagnosis_reply: &str) -> Self {
        Self {
            diagnosis_reply: diagnosis_reply.to_string(),
            medication_prompts: RefCell::new(Vec::new()),
        }
    }
}

impl CompletionBackend for ChatBackend {
    fn complete(
        &self,
        _convention: CallConvention,
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        if request.system.is_some() {
            self.medication_prompts
                .borrow_mut()
                .push(request.prompt.clone());
            Ok("Take paracetamol".to_string())
        } else {
            Ok(self.diagnosis_reply.clone())
        }
    }
}

fn run_turns(reply: &str, inputs: &[&str]) -> (ChatSession, Vec<String>) {
    let index = VectorIndex::build_seed(&FlatEmbedder).expect("seed index should build");
    let backend = ChatBackend::new(reply);
    let service = DiagnosisService::new(&index, &FlatEmbedder, &backend, DiagnosisSettings::default());
    let recommender = MedicationRecommender::new(&backend, "gpt-4-turbo");
    let assistant = Assistant::new(&service, &recommender);

    let session = inputs.iter().fold(ChatSession::new(Language::En), |session, input| {
        assistant.handle_user_input(session, input)
    });
    let prompts = backend.medication_prompts.borrow().clone();
    (session, prompts)
}

#[test]
fn new_session_starts_with_greeting() {
    let session = ChatSession::new(Language::Zh);

    assert_eq!(session.history.len(), 1);
    assert!(!session.history[0].is_user);
    assert_eq!(session.history[0].text, Language::Zh.greeting());
    assert!(session.current_diagnosis.is_none());
    assert!(session.recommended_medications.is_none());
}

#[test]
fn diagnosis_with_label_triggers_recommendation() {
    let (session, prompts) = run_turns("1. Preliminary Diagnosis: Common cold", &["runny nose"]);

    assert_eq!(session.history.len(), 3);
    assert!(session.history[1].is_user);
    assert_eq!(session.history[1].text, "runny nose");
    assert_eq!(session.history[2].text, "1. Preliminary Diagnosis: Common cold");
    assert_eq!(
        session.current_diagnosis.as_deref(),
        Some("1. Preliminary Diagnosis: Common cold")
    );
    assert_eq!(
        session.recommended_medications,
        Some(MedicationAdvice::Recommended("Take paracetamol".to_string()))
    );
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("over-the-counter"));
}

#[test]
fn diagnosis_without_label_skips_recommendation() {
    let (session, prompts) = run_turns("Please describe your symptoms in more detail.", &["hello"]);

    assert_eq!(session.history.len(), 3);
    assert!(session.recommended_medications.is_none());
    assert!(prompts.is_empty());
}

#[test]
fn chinese_input_gets_chinese_medication_prompt() {
    let (_, prompts) = run_turns("1. 初步诊断：感冒", &["我流鼻涕"]);

    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("非处方药物"));
}

#[test]
fn blank_input_is_ignored() {
    let (session, prompts) = run_turns("Preliminary Diagnosis: cold", &["   "]);

    assert_eq!(session.history.len(), 1);
    assert!(session.current_diagnosis.is_none());
    assert!(session.recommended_medications.is_none());
    assert!(prompts.is_empty());
}

#[test]
fn history_accumulates_across_turns() {
    let (session, prompts) = run_turns("Preliminary Diagnosis: cold", &["sneezing", "still sneezing"]);

    assert_eq!(session.history.len(), 5);
    let user_turns: Vec<&str> = session
        .history
        .iter()
        .filter(|turn| turn.is_user)
        .map(|turn| turn.text.as_str())
        .collect();
    assert_eq!(user_turns, vec!["sneezing", "still sneezing"]);
    assert_eq!(prompts.len(), 2);
}
