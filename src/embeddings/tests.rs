use super::*;
use crate::config::EmbeddingConfig;

#[test]
fn build_token_client() {
    let mut config = EmbeddingConfig::for_provider(EmbeddingProvider::Token);
    config.embedding_dimension = 96;

    let client = build_client(&config).expect("token client builds");
    assert_eq!(client.model_name(), "token-hash");
}

#[test]
fn build_ollama_client() {
    let client = build_client(&EmbeddingConfig::default()).expect("ollama client builds");
    assert_eq!(client.model_name(), crate::config::settings::DEFAULT_OLLAMA_MODEL);
}

#[test]
fn build_openai_client_without_key_fails() {
    let mut config = EmbeddingConfig::for_provider(EmbeddingProvider::OpenAi);
    config.api_key_env = "VECTORMIND_TEST_KEY_THAT_IS_NEVER_SET".to_string();

    let result = build_client(&config);
    assert!(matches!(result, Err(RagError::Other(_))));
}

#[tokio::test]
async fn built_token_client_embeds_with_configured_dimension() {
    let mut config = EmbeddingConfig::for_provider(EmbeddingProvider::Token);
    config.embedding_dimension = 48;

    let client = build_client(&config).expect("token client builds");
    let embedding = client.embed("hello world").await.expect("embed");
    assert_eq!(embedding.len(), 48);
}

#[tokio::test]
async fn run_blocking_maps_errors() {
    let result: Result<()> = run_blocking(|| Err(anyhow::anyhow!("backend down"))).await;
    match result {
        Err(RagError::Embedding(message)) => assert!(message.contains("backend down")),
        other => panic!("unexpected result: {:?}", other),
    }
}
