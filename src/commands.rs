use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::chat::{Assistant, ChatSession};
use crate::config::Config;
use crate::diagnosis::{
    DiagnosisResult, DiagnosisService, DiagnosisSettings, MedicationAdvice, MedicationRecommender,
    should_recommend,
};
use crate::index::{IndexOrigin, VectorIndex};
use crate::llm::OpenAiClient;
use crate::prompt::{Language, detect_language};
use crate::training;

fn spinner(message: &'static str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("progress bar template should be valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn create_client(config: &Config) -> Result<OpenAiClient> {
    OpenAiClient::new(&config.llm).with_context(|| {
        format!(
            "Failed to create API client (is {} set?)",
            config.llm.api_key_env
        )
    })
}

fn open_index(config: &Config, client: &OpenAiClient, force_rebuild: bool) -> Result<VectorIndex> {
    let bar = spinner("Preparing medical knowledge index");
    let index = VectorIndex::open_or_build(config, client, force_rebuild);
    bar.finish_and_clear();

    let index = index.context("Failed to build the medical knowledge index")?;
    if index.origin() == IndexOrigin::Seed {
        eprintln!(
            "{}",
            style(format!(
                "⚠ Records at {} could not be used; answering from the built-in seed passages",
                config.data.records_path.display()
            ))
            .yellow()
        );
    }
    Ok(index)
}

/// Rebuild the index from the records file and save it
#[inline]
pub fn build_index(config: &Config) -> Result<()> {
    let client = create_client(config)?;
    let index = open_index(config, &client, true)?;

    println!("Index built: {} passages", index.len());
    println!("  Origin: {:?}", index.origin());
    println!("  Embedding model: {}", index.embedding_model());
    println!("  Dimension: {}", index.dimension());
    println!("  Saved to: {}", config.index.dir.display());

    Ok(())
}

/// Describe the saved index without contacting the API
#[inline]
pub fn show_index(config: &Config) -> Result<()> {
    let index = VectorIndex::load(&config.index.dir).with_context(|| {
        format!(
            "No usable index in {}; run 'clinix index build' first",
            config.index.dir.display()
        )
    })?;

    println!("{}", style("Saved index").bold().cyan());
    println!("  Location: {}", config.index.dir.display());
    println!("  Passages: {}", index.len());
    println!("  Origin: {:?}", index.origin());
    println!("  Embedding model: {}", index.embedding_model());
    println!("  Dimension: {}", index.dimension());
    println!(
        "  Built: {}",
        index.built_at().format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}

/// Diagnose a single symptom description
#[inline]
pub fn diagnose(
    config: &Config,
    symptoms: &str,
    language: Option<Language>,
    with_medication: bool,
) -> Result<()> {
    let client = create_client(config)?;
    let index = open_index(config, &client, false)?;
    let language = language.unwrap_or_else(|| detect_language(symptoms));

    let service = DiagnosisService::new(
        &index,
        &client,
        &client,
        DiagnosisSettings::from_config(config),
    );

    let bar = spinner("ClinixBot is analyzing your symptoms...");
    let result = service.get_diagnosis(symptoms, language);
    bar.finish_and_clear();

    print_diagnosis(&result);

    if with_medication && should_recommend(&result.diagnosis) {
        let recommender = MedicationRecommender::from_config(&client, &config.llm);
        let bar = spinner("Generating medication recommendations...");
        let advice = recommender.recommend(&result.diagnosis, language);
        bar.finish_and_clear();
        print_medication(&advice);
    }

    if !result.is_answered() {
        anyhow::bail!("Diagnosis did not complete");
    }

    Ok(())
}

/// Ask for medication guidance for an existing diagnosis
#[inline]
pub fn recommend(config: &Config, diagnosis: &str, language: Option<Language>) -> Result<()> {
    let client = create_client(config)?;
    let language = language.unwrap_or_else(|| detect_language(diagnosis));

    let recommender = MedicationRecommender::from_config(&client, &config.llm);
    let bar = spinner("Generating medication recommendations...");
    let advice = recommender.recommend(diagnosis, language);
    bar.finish_and_clear();

    print_medication(&advice);

    if !advice.is_recommended() {
        anyhow::bail!("Medication recommendation did not complete");
    }

    Ok(())
}

/// Interactive conversation; an empty line or `exit` ends it
#[inline]
pub fn run_chat(config: &Config, language: Language) -> Result<()> {
    let client = create_client(config)?;
    let index = open_index(config, &client, false)?;

    let service = DiagnosisService::new(
        &index,
        &client,
        &client,
        DiagnosisSettings::from_config(config),
    );
    let recommender = MedicationRecommender::from_config(&client, &config.llm);
    let assistant = Assistant::new(&service, &recommender);

    let mut session = ChatSession::new(language);
    for turn in &session.history {
        println!("🏥 {}", turn.text);
    }
    println!("{}", style(language.disclaimer()).dim());
    println!();

    loop {
        let input: String = Input::new()
            .with_prompt("👤")
            .allow_empty(true)
            .interact_text()?;

        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("exit") {
            break;
        }

        let previous_advice = session.recommended_medications.clone();
        let bar = spinner("ClinixBot is analyzing your symptoms...");
        session = assistant.handle_user_input(session, trimmed);
        bar.finish_and_clear();

        if let Some(reply) = session.history.last() {
            println!();
            println!("🏥 {}", reply.text);
        }

        if session.recommended_medications != previous_advice {
            if let Some(advice) = &session.recommended_medications {
                print_medication(advice);
            }
        }
        println!();
    }

    info!(
        "Chat ended after {} turns",
        session.history.iter().filter(|turn| turn.is_user).count()
    );
    Ok(())
}

/// Convert the records file into fine-tuning JSONL
#[inline]
pub fn export_training(config: &Config, out: &Path) -> Result<()> {
    let samples = training::prepare_training_data(&config.data.records_path).with_context(|| {
        format!(
            "Failed to prepare training data from {}",
            config.data.records_path.display()
        )
    })?;

    training::write_jsonl(&samples, out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "Exported {} training samples to {}",
        samples.len(),
        out.display()
    );
    Ok(())
}

fn print_diagnosis(result: &DiagnosisResult) {
    if result.is_answered() {
        println!("{}", style("Diagnosis").bold().cyan());
    } else {
        println!("{}", style("Diagnosis failed").bold().red());
    }
    println!("{}", result.diagnosis);

    if !result.sources.is_empty() {
        println!();
        println!("{}", style("Sources").bold());
        for (i, source) in result.sources.iter().enumerate() {
            println!("  [{}] {}", i + 1, source.replace('\n', "\n      "));
        }
    }
}

fn print_medication(advice: &MedicationAdvice) {
    println!();
    match advice {
        MedicationAdvice::Recommended(text) => {
            println!("{}", style("💊 Medication Recommendations").bold().green());
            println!("{}", text);
        }
        MedicationAdvice::Failed { message, .. } => {
            println!("{}", style(message).red());
        }
    }
}
