use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Gridweave server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the document analysis provider.
    pub analysis_url: String,
    /// Optional API key for the document analysis provider.
    pub analysis_api_key: Option<String>,
    /// Number of attempts made against the analysis provider before the
    /// document is declared failed.
    pub analysis_max_retries: usize,
    /// Base URL of the table OCR provider.
    pub table_ocr_url: String,
    /// Optional API key for the table OCR provider.
    pub table_ocr_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Summarization provider used for table semantic summaries.
    pub summarization_provider: SummarizationProvider,
    /// Model identifier used for table summaries.
    pub summarization_model: Option<String>,
    /// Base URL of the local Ollama runtime, shared by embedding and
    /// summarization adapters.
    pub ollama_url: Option<String>,
    /// Maximum token budget per chunk.
    pub chunk_max_tokens: usize,
    /// Sliding token overlap applied when an oversized segment is split.
    pub chunk_token_overlap: usize,
    /// Upper bound on tables normalized concurrently within one document.
    pub table_concurrency: usize,
    /// Fraction of header cells above which a table is considered complex.
    pub table_header_cell_fraction: f32,
    /// Confidence substituted for cells the OCR provider scored as unknown.
    pub default_cell_confidence: f32,
    /// Directory where per-table artifacts are written.
    pub artifact_dir: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic local encoder, useful for offline runs and tests.
    Deterministic,
}

/// Supported summarization backends for table semantics.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationProvider {
    /// Summaries disabled; tables carry an empty semantic summary.
    None,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            analysis_url: load_env("ANALYSIS_URL")?,
            analysis_api_key: load_env_optional("ANALYSIS_API_KEY"),
            analysis_max_retries: parse_optional("ANALYSIS_MAX_RETRIES")?.unwrap_or(3),
            table_ocr_url: load_env("TABLE_OCR_URL")?,
            table_ocr_api_key: load_env_optional("TABLE_OCR_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            summarization_provider: load_env_optional("SUMMARIZATION_PROVIDER")
                .map(|value| {
                    value.parse().map_err(|()| {
                        ConfigError::InvalidValue("SUMMARIZATION_PROVIDER".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(SummarizationProvider::None),
            summarization_model: load_env_optional("SUMMARIZATION_MODEL"),
            ollama_url: load_env_optional("OLLAMA_URL"),
            chunk_max_tokens: parse_optional("CHUNK_MAX_TOKENS")?.unwrap_or(2048),
            chunk_token_overlap: parse_optional("CHUNK_TOKEN_OVERLAP")?.unwrap_or(100),
            table_concurrency: parse_optional("TABLE_CONCURRENCY")?.unwrap_or(4).max(1),
            table_header_cell_fraction: load_env_optional("TABLE_HEADER_CELL_FRACTION")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("TABLE_HEADER_CELL_FRACTION".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(0.4),
            default_cell_confidence: load_env_optional("DEFAULT_CELL_CONFIDENCE")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("DEFAULT_CELL_CONFIDENCE".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(0.5),
            artifact_dir: load_env_optional("ARTIFACT_DIR").unwrap_or_else(|| "artifacts".into()),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional(key: &str) -> Result<Option<usize>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "deterministic" => Ok(Self::Deterministic),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for SummarizationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        analysis_url = %config.analysis_url,
        table_ocr_url = %config.table_ocr_url,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        table_concurrency = config.table_concurrency,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
