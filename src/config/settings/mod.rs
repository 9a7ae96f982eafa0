
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::limits::RateLimitConfig;
use crate::storage::BackendKind;

const CONFIG_FILE: &str = "config.toml";
const APP_DIR_NAME: &str = "vectormind";
/// Overrides the application directory when set
pub const HOME_ENV_VAR: &str = "VECTORMIND_HOME";

pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text:latest";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OLLAMA_DIMENSION: u32 = 768;
pub const DEFAULT_OPENAI_DIMENSION: u32 = 1536;
pub const DEFAULT_TOKEN_DIMENSION: u32 = 512;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub limits: RateLimitConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which embedding service turns text into vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Ollama,
    OpenAi,
    /// Offline hashed bag-of-words embedder
    Token,
}

impl EmbeddingProvider {
    pub const ALL: [Self; 3] = [Self::Ollama, Self::OpenAi, Self::Token];
}

impl fmt::Display for EmbeddingProvider {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAi => write!(f, "openai"),
            Self::Token => write!(f, "token"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
    /// Name of the environment variable holding the API key (OpenAI only)
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::for_provider(EmbeddingProvider::Ollama)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Root directory of the local backend. Relative paths resolve against
    /// the application directory.
    pub local_root: PathBuf,
    pub endpoint: String,
    pub bucket: String,
    pub prefix: String,
    /// Name of the environment variable holding the object store bearer token
    pub token_env: String,
    pub timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            local_root: PathBuf::from("data"),
            endpoint: "http://localhost:9000".to_string(),
            bucket: String::new(),
            prefix: "rag-sessions/".to_string(),
            token_env: "VECTORMIND_STORE_TOKEN".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Reload the chunk text after every write and compare counts
    pub verify_writes: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            verify_writes: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("API key environment variable name cannot be empty")]
    MissingApiKeyEnv,
    #[error("Invalid chunk size: {0} (must be between 16 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    InvalidChunkOverlap(usize, usize),
    #[error("Object store bucket cannot be empty")]
    MissingBucket,
    #[error("Local storage root cannot be empty")]
    MissingLocalRoot,
    #[error("Invalid storage timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidStorageTimeout(u64),
    #[error("Invalid rate limit: {0} (must be at least 1)")]
    InvalidRateLimit(u32),
    #[error("Invalid rate window: {0} (must be at least 1 second)")]
    InvalidRateWindow(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Application directory: `$VECTORMIND_HOME` or `<config dir>/vectormind`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE)
    }

    /// Storage settings with a relative local root resolved against the
    /// application directory
    #[inline]
    pub fn resolved_storage(&self) -> StorageConfig {
        let mut storage = self.storage.clone();
        if storage.local_root.is_relative() {
            storage.local_root = self.base_dir.join(&storage.local_root);
        }
        storage
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.storage.validate()?;
        self.validate_chunking_config()?;
        self.validate_limits_config()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(16..=8192).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_limits_config(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;

        for limit in [limits.daily_limit, limits.burst_limit] {
            if limit == 0 {
                return Err(ConfigError::InvalidRateLimit(limit));
            }
        }
        for window in [limits.daily_window_seconds, limits.burst_window_seconds] {
            if window == 0 {
                return Err(ConfigError::InvalidRateWindow(window));
            }
        }

        Ok(())
    }
}

impl EmbeddingConfig {
    /// Defaults appropriate for a provider
    #[inline]
    pub fn for_provider(provider: EmbeddingProvider) -> Self {
        match provider {
            EmbeddingProvider::Ollama => Self {
                provider,
                protocol: "http".to_string(),
                host: "localhost".to_string(),
                port: 11434,
                model: DEFAULT_OLLAMA_MODEL.to_string(),
                batch_size: 16,
                embedding_dimension: DEFAULT_OLLAMA_DIMENSION,
                api_key_env: String::new(),
            },
            EmbeddingProvider::OpenAi => Self {
                provider,
                protocol: "https".to_string(),
                host: "api.openai.com".to_string(),
                port: 443,
                model: DEFAULT_OPENAI_MODEL.to_string(),
                batch_size: 16,
                embedding_dimension: DEFAULT_OPENAI_DIMENSION,
                api_key_env: "OPENAI_API_KEY".to_string(),
            },
            EmbeddingProvider::Token => Self {
                provider,
                protocol: "http".to_string(),
                host: "localhost".to_string(),
                port: 11434,
                model: "token-hash".to_string(),
                batch_size: 16,
                embedding_dimension: DEFAULT_TOKEN_DIMENSION,
                api_key_env: String::new(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.base_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(8..=8192).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if self.provider == EmbeddingProvider::OpenAi && self.api_key_env.trim().is_empty() {
            return Err(ConfigError::MissingApiKeyEnv);
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        let url = Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str.clone()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidUrl(url_str));
        }
        Ok(url)
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.base_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(8..=8192).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidStorageTimeout(self.timeout_seconds));
        }

        match self.backend {
            BackendKind::Local => {
                if self.local_root.as_os_str().is_empty() {
                    return Err(ConfigError::MissingLocalRoot);
                }
            }
            BackendKind::ObjectStore => {
                let url = Url::parse(&self.endpoint)
                    .map_err(|_| ConfigError::InvalidUrl(self.endpoint.clone()))?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
                }
                if self.bucket.trim_matches('/').is_empty() {
                    return Err(ConfigError::MissingBucket);
                }
            }
        }

        Ok(())
    }
}
