
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{Config, LlmConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 ClinixBot Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Language Model API").bold().yellow());
    eprintln!("Configure the OpenAI-compatible API used for embeddings and diagnosis.");
    eprintln!();

    configure_llm(&mut config.llm)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    config.retrieval.top_k = Input::new()
        .with_prompt("Passages retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=50).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 50")
            }
        })
        .interact_text()?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_api_connection(&config.llm) {
        ConnectionCheck::Reachable => {
            eprintln!("{}", style("✓ API connection successful!").green());
        }
        ConnectionCheck::MissingKey => {
            eprintln!(
                "{}",
                style(format!(
                    "⚠ Warning: {} is not set in the environment",
                    config.llm.api_key_env
                ))
                .yellow()
            );
        }
        ConnectionCheck::Unreachable => {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not reach the API").yellow()
            );
            eprintln!("You can continue, but diagnosis requests will fail until it is reachable.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("LLM Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.llm.base_url).cyan());
    eprintln!("  Chat Model: {}", style(&config.llm.chat_model).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.llm.embedding_model).cyan()
    );
    eprintln!(
        "  Embedding Batch Size: {}",
        style(config.llm.embedding_batch_size).cyan()
    );
    eprintln!(
        "  Temperatures: diagnosis {} / medication {}",
        style(config.llm.diagnosis_temperature).cyan(),
        style(config.llm.recommendation_temperature).cyan()
    );
    let key_state = if config.llm.api_key().is_some() {
        style("set").green()
    } else {
        style("missing").red()
    };
    eprintln!("  API Key ({}): {}", config.llm.api_key_env, key_state);

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Chunk Size / Overlap: {} / {}",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Records: {}",
        style(config.data.records_path.display()).cyan()
    );
    eprintln!(
        "  Index Directory: {} (reuse saved: {})",
        style(config.index.dir.display()).cyan(),
        config.index.reuse_saved
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let config_dir = Config::config_dir().context("Failed to determine config directory")?;
    Config::load_from(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_llm(llm: &mut LlmConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(llm.base_url.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let temp_config = LlmConfig {
                base_url: input.clone(),
                ..LlmConfig::default()
            };
            temp_config
                .api_url()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(llm.chat_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(llm.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(llm.embedding_batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    llm.set_base_url(base_url)?;
    llm.set_chat_model(chat_model)?;
    llm.set_embedding_model(embedding_model)?;
    llm.set_embedding_batch_size(batch_size)?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionCheck {
    Reachable,
    MissingKey,
    Unreachable,
}

fn test_api_connection(llm: &LlmConfig) -> ConnectionCheck {
    let Some(api_key) = llm.api_key() else {
        return ConnectionCheck::MissingKey;
    };
    let Ok(url) = llm.api_url().and_then(|base| {
        base.join("models")
            .map_err(|_| super::ConfigError::InvalidUrl(llm.base_url.clone()))
    }) else {
        return ConnectionCheck::Unreachable;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent
        .get(url.as_str())
        .header("Authorization", format!("Bearer {}", api_key))
        .call()
    {
        Ok(_) => ConnectionCheck::Reachable,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => {
            ConnectionCheck::Reachable
        }
        Err(_) => ConnectionCheck::Unreachable,
    }
}
