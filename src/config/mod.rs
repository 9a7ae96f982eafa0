// Configuration management module
// TOML configuration for embedding, storage, chunking and rate limits

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, EmbeddingProvider, IndexConfig, StorageConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}

/// Load the configuration from the application directory
#[inline]
pub fn load_config() -> anyhow::Result<Config> {
    Config::load(get_config_dir()?)
}
