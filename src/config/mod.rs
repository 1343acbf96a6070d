// Configuration management module
// TOML settings, validation, and the interactive setup

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CONFIG_DIR_ENV, Config, ConfigError, DataConfig, IndexConfig, LlmConfig, RetrievalConfig,
};
