#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};
use vectormind::config::{EmbeddingConfig, EmbeddingProvider};
use vectormind::embeddings::OllamaClient;
use vectormind::session::SessionIndexManager;
use vectormind::storage::LocalFilesystemBackend;

const TEST_MODEL: &str = "nomic-embed-text:latest";
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn integration_config() -> EmbeddingConfig {
    let mut config = EmbeddingConfig::for_provider(EmbeddingProvider::Ollama);
    config.host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    config.port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    config.model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());
    config.batch_size = 2;
    config
}

fn create_integration_test_client() -> OllamaClient {
    OllamaClient::new(&integration_config())
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_list_models() {
    init_test_tracing();

    let client = create_integration_test_client();
    let models = client.list_models().expect("models listed");

    info!("Found {} models", models.len());
    assert!(
        models.iter().any(|m| m.name == integration_config().model),
        "Test model should be pulled: {:?}",
        models.iter().map(|m| &m.name).collect::<Vec<_>>()
    );
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_batch_embeddings() {
    init_test_tracing();

    let client = create_integration_test_client();
    let texts = vec![
        "Document about artificial intelligence and machine learning.".to_string(),
        "Guide to web development with JavaScript and TypeScript.".to_string(),
        "Tutorial on database design and SQL optimization.".to_string(),
    ];

    let embeddings = client
        .generate_embeddings_batch(&texts)
        .expect("batch embeddings");
    assert_eq!(embeddings.len(), texts.len());

    let first_dim = embeddings[0].len();
    assert!(first_dim >= 100, "Embedding should have reasonable dimensions");
    for (i, embedding) in embeddings.iter().enumerate() {
        debug!("Embedding {}: {} dimensions", i, embedding.len());
        assert_eq!(embedding.len(), first_dim);
    }

    assert!(
        client
            .generate_embeddings_batch(&[])
            .expect("empty batch")
            .is_empty()
    );
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_unknown_model_fails() {
    init_test_tracing();

    let mut config = integration_config();
    config.model = "non-existent-model-12345".to_string();
    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(10))
        .with_retry_attempts(1);

    assert!(client.health_check().is_err());
    assert!(client.generate_embedding("test text").is_err());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Ollama instance"]
async fn real_ollama_session_retrieval() {
    init_test_tracing();

    let temp_dir = TempDir::new().expect("temp dir");
    let manager = SessionIndexManager::new(
        Arc::new(LocalFilesystemBackend::new(temp_dir.path())),
        Arc::new(create_integration_test_client()),
        true,
    );

    manager
        .add_chunks(
            Some("ollama"),
            &[
                "Paris is the capital of France.".to_string(),
                "Tokyo is the capital of Japan.".to_string(),
            ],
        )
        .await
        .expect("add");

    let hits = manager
        .search_text(Some("ollama"), "What is the capital of France?", 1, None)
        .await
        .expect("search");
    assert_eq!(hits[0].text, "Paris is the capital of France.");
}
