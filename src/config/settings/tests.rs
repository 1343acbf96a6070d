use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.llm.chat_model, "gpt-4-turbo");
    assert_eq!(config.llm.embedding_batch_size, 64);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.retrieval.top_k, 5);
    assert!(!config.index.reuse_saved);
    assert!(config.llm.timeout_seconds.is_none());
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.llm.base_url = "ftp://example.com/v1".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.llm.chat_model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.llm.embedding_batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.llm.recommendation_temperature = 2.5;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.llm.timeout_seconds = Some(0);
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config;
    invalid_config.chunking.chunk_overlap = invalid_config.chunking.chunk_size;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidChunkOverlap(1000, 1000))
    ));
}

#[test]
fn api_url_gets_trailing_slash() {
    let config = Config::default();
    let url = config
        .llm
        .api_url()
        .expect("should generate api url successfully");
    assert_eq!(url.as_str(), "https://api.openai.com/v1/");
    assert_eq!(
        url.join("chat/completions")
            .expect("endpoint should join")
            .as_str(),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn toml_serialization() {
    let mut config = Config::default();
    config.llm.timeout_seconds = Some(45);
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [llm]
        chat_model = "gpt-4o-mini"

        [retrieval]
        top_k = 3
    "#;

    let config: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(config.llm.chat_model, "gpt-4o-mini");
    assert_eq!(config.llm.embedding_model, "text-embedding-ada-002");
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.chunking.chunk_size, 1000);
}

#[test]
fn setter_validation() {
    let mut llm = LlmConfig::default();

    assert!(llm.set_base_url("http://localhost:8080/v1".to_string()).is_ok());
    assert!(llm.set_chat_model("gpt-4o".to_string()).is_ok());
    assert!(llm.set_embedding_model("text-embedding-3-small".to_string()).is_ok());
    assert!(llm.set_embedding_batch_size(128).is_ok());
    assert!(llm.set_diagnosis_temperature(0.3).is_ok());

    assert!(llm.set_base_url("not a url".to_string()).is_err());
    assert!(llm.set_chat_model(String::new()).is_err());
    assert!(llm.set_embedding_batch_size(0).is_err());
    assert!(llm.set_diagnosis_temperature(-0.1).is_err());

    assert_eq!(llm.base_url, "http://localhost:8080/v1");
    assert_eq!(llm.embedding_batch_size, 128);
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load_from(temp_dir.path()).expect("missing config should load");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.llm, LlmConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load_from(temp_dir.path()).expect("config should load");
    config.retrieval.top_k = 7;
    config.index.reuse_saved = true;

    config.save().expect("config should save");
    assert!(config.config_file_path().exists());

    let reloaded = Config::load_from(temp_dir.path()).expect("config should reload");
    assert_eq!(reloaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 500\n",
    )
    .expect("should write config");

    assert!(Config::load_from(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn config_dir_respects_override() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    // SAFETY: serialized with every other test touching the process environment
    unsafe {
        std::env::set_var(CONFIG_DIR_ENV, temp_dir.path());
    }

    let dir = Config::config_dir().expect("config dir should resolve");

    // SAFETY: serialized with every other test touching the process environment
    unsafe {
        std::env::remove_var(CONFIG_DIR_ENV);
    }

    assert_eq!(dir, temp_dir.path());
}

#[test]
#[serial]
fn api_key_read_from_environment() {
    let llm = LlmConfig {
        api_key_env: "CLINIX_TEST_API_KEY".to_string(),
        ..LlmConfig::default()
    };

    // SAFETY: serialized with every other test touching the process environment
    unsafe {
        std::env::remove_var("CLINIX_TEST_API_KEY");
    }
    assert_eq!(llm.api_key(), None);

    // SAFETY: serialized with every other test touching the process environment
    unsafe {
        std::env::set_var("CLINIX_TEST_API_KEY", "sk-test");
    }
    assert_eq!(llm.api_key(), Some("sk-test".to_string()));

    // SAFETY: serialized with every other test touching the process environment
    unsafe {
        std::env::remove_var("CLINIX_TEST_API_KEY");
    }
}

#[test]
fn diagnosis_temperature_stays_low() {
    let mut config = Config::default();
    config.llm.diagnosis_temperature = 0.8;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidDiagnosisTemperature(_))
    ));

    let mut llm = LlmConfig::default();
    assert!(llm.set_diagnosis_temperature(0.3).is_ok());
    assert!(matches!(
        llm.set_diagnosis_temperature(1.0),
        Err(ConfigError::InvalidDiagnosisTemperature(_))
    ));
    assert!((llm.diagnosis_temperature - 0.3).abs() < f32::EPSILON);

    // The recommendation stage keeps the wider range
    config.llm.diagnosis_temperature = 0.2;
    config.llm.recommendation_temperature = 1.5;
    assert!(config.validate().is_ok());
}
