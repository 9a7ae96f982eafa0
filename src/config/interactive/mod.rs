
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::{Path, PathBuf};

use super::{Config, ConfigError, EmbeddingConfig, EmbeddingProvider, StorageConfig};
use crate::storage::BackendKind;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 VectorMind Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = Config::default_dir().context("Failed to resolve config directory")?;
    let mut config = load_existing_config(&config_dir)?;

    eprintln!("{}", style("Embedding Configuration").bold().yellow());
    eprintln!("Choose the service that turns text chunks into vectors.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Storage Configuration").bold().yellow());
    eprintln!("Session indexes live on the local disk or in an HTTP object store.");
    eprintln!();

    configure_storage(&mut config.storage)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_embedding_connection(&config.embedding) {
        eprintln!("{}", style("✓ Embedding service reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the embedding service").yellow()
        );
        eprintln!("You can continue, but make sure it is available before adding documents.");
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
    let config_dir = Config::default_dir().context("Failed to resolve config directory")?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!(
        "  Dimension: {}",
        style(config.embedding.embedding_dimension).cyan()
    );
    if config.embedding.provider != EmbeddingProvider::Token {
        match config.embedding.base_url() {
            Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
        }
    }
    if config.embedding.provider == EmbeddingProvider::OpenAi {
        eprintln!("  API key from: ${}", style(&config.embedding.api_key_env).cyan());
    }

    eprintln!();
    eprintln!("{}", style("Storage Settings:").bold().yellow());
    let storage = config.resolved_storage();
    eprintln!("  Backend: {}", style(storage.backend).cyan());
    match storage.backend {
        BackendKind::Local => {
            eprintln!("  Root: {}", style(storage.local_root.display()).cyan());
        }
        BackendKind::ObjectStore => {
            eprintln!("  Endpoint: {}", style(&storage.endpoint).cyan());
            eprintln!("  Bucket: {}", style(&storage.bucket).cyan());
            eprintln!("  Prefix: {}", style(&storage.prefix).cyan());
        }
    }

    eprintln!();
    eprintln!("{}", style("Chunking & Limits:").bold().yellow());
    eprintln!(
        "  Chunk size: {} (overlap {})",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!(
        "  Requests: {} per day, {} per burst window",
        style(config.limits.daily_limit).cyan(),
        style(config.limits.burst_limit).cyan()
    );
    eprintln!(
        "  Verify writes: {}",
        style(config.index.verify_writes).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let providers: Vec<String> = EmbeddingProvider::ALL
        .iter()
        .map(ToString::to_string)
        .collect();
    let default_index = EmbeddingProvider::ALL
        .iter()
        .position(|&p| p == embedding.provider)
        .unwrap_or(0);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(&providers)
        .interact()?;
    let provider = EmbeddingProvider::ALL
        .get(provider_index)
        .copied()
        .unwrap_or_default();

    if provider != embedding.provider {
        *embedding = EmbeddingConfig::for_provider(provider);
    }

    if provider != EmbeddingProvider::Token {
        configure_endpoint(embedding)?;
    }

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (8..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 8 and 8192")
            }
        })
        .interact_text()?;

    if provider == EmbeddingProvider::OpenAi {
        let api_key_env: String = Input::new()
            .with_prompt("Environment variable holding the API key")
            .default(embedding.api_key_env.clone())
            .interact_text()?;
        embedding.api_key_env = api_key_env;
    }

    embedding.set_model(model)?;
    embedding.set_embedding_dimension(dimension)?;

    Ok(())
}

fn configure_endpoint(embedding: &mut EmbeddingConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;
    let protocol = protocols
        .get(protocol_index)
        .copied()
        .unwrap_or("http")
        .to_string();

    let host: String = Input::new()
        .with_prompt("Host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = EmbeddingConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            };
            temp_config.base_url()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_protocol(protocol)?;
    embedding.set_host(host)?;
    embedding.set_port(port)?;

    Ok(())
}

fn configure_storage(storage: &mut StorageConfig) -> Result<()> {
    let backends = [BackendKind::Local, BackendKind::ObjectStore];
    let labels = &["local filesystem", "HTTP object store"];
    let default_index = backends
        .iter()
        .position(|&b| b == storage.backend)
        .unwrap_or(0);

    let backend_index = Select::new()
        .with_prompt("Storage backend")
        .default(default_index)
        .items(labels)
        .interact()?;
    storage.backend = backends
        .get(backend_index)
        .copied()
        .unwrap_or(BackendKind::Local);

    match storage.backend {
        BackendKind::Local => {
            let root: String = Input::new()
                .with_prompt("Data directory (relative paths live under the config directory)")
                .default(storage.local_root.display().to_string())
                .interact_text()?;
            storage.local_root = PathBuf::from(root);
        }
        BackendKind::ObjectStore => {
            storage.endpoint = Input::new()
                .with_prompt("Object store endpoint")
                .default(storage.endpoint.clone())
                .validate_with(|input: &String| -> Result<(), String> {
                    url::Url::parse(input)
                        .map(|_| ())
                        .map_err(|e| format!("Invalid URL: {}", e))
                })
                .interact_text()?;
            storage.bucket = Input::new()
                .with_prompt("Bucket")
                .default(storage.bucket.clone())
                .validate_with(|input: &String| -> Result<(), &str> {
                    if input.trim_matches('/').is_empty() {
                        Err("Bucket cannot be empty")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?;
            storage.prefix = Input::new()
                .with_prompt("Key prefix")
                .default(storage.prefix.clone())
                .allow_empty(true)
                .interact_text()?;
            storage.token_env = Input::new()
                .with_prompt("Environment variable holding the bearer token")
                .default(storage.token_env.clone())
                .interact_text()?;
        }
    }

    storage.validate()?;
    Ok(())
}

fn test_embedding_connection(embedding: &EmbeddingConfig) -> bool {
    match embedding.provider {
        EmbeddingProvider::Token => true,
        EmbeddingProvider::OpenAi => std::env::var(&embedding.api_key_env)
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false),
        EmbeddingProvider::Ollama => {
            let Ok(base_url) = embedding.base_url() else {
                return false;
            };
            let url = format!("{}api/version", base_url);

            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(std::time::Duration::from_secs(5)))
                .build()
                .into();

            match agent.get(&url).call() {
                Ok(_) => true,
                Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
                Err(_) => false,
            }
        }
    }
}
