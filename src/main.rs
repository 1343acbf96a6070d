use clap::{Parser, Subcommand};
use clinix::Result;
use clinix::commands::{
    build_index, diagnose, export_training, recommend, run_chat, show_index,
};
use clinix::config::{Config, run_interactive_config, show_config};
use clinix::prompt::Language;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clinix")]
#[command(about = "Symptom diagnosis and medication guidance backed by a medical records index")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the language model API and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Manage the medical knowledge index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Diagnose a symptom description
    Diagnose {
        /// Free-text description of the symptoms
        symptoms: String,
        /// Answer language (en or zh); detected from the text when omitted
        #[arg(long)]
        language: Option<Language>,
        /// Also ask for over-the-counter medication guidance
        #[arg(long)]
        with_medication: bool,
    },
    /// Recommend medication for a diagnosis text
    Recommend {
        /// Diagnosis text, usually the output of `diagnose`
        diagnosis: String,
        /// Answer language (en or zh); detected from the text when omitted
        #[arg(long)]
        language: Option<Language>,
    },
    /// Start an interactive chat session
    Chat {
        /// Language of the greeting (en or zh)
        #[arg(long, default_value = "en")]
        language: Language,
    },
    /// Export the records file as fine-tuning JSONL
    ExportTraining {
        /// Output file
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild the index from the records file and save it
    Build,
    /// Show the saved index
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index { action } => {
            let config = Config::load()?;
            match action {
                IndexAction::Build => build_index(&config)?,
                IndexAction::Show => show_index(&config)?,
            }
        }
        Commands::Diagnose {
            symptoms,
            language,
            with_medication,
        } => {
            diagnose(&Config::load()?, &symptoms, language, with_medication)?;
        }
        Commands::Recommend {
            diagnosis,
            language,
        } => {
            recommend(&Config::load()?, &diagnosis, language)?;
        }
        Commands::Chat { language } => {
            run_chat(&Config::load()?, language)?;
        }
        Commands::ExportTraining { out } => {
            export_training(&Config::load()?, &out)?;
        }
    }

    Ok(())
}
