use super::*;
use crate::RagError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EmbeddingConfig {
    let address = server.address();
    EmbeddingConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: "test-model".to_string(),
        batch_size: 2,
        ..EmbeddingConfig::default()
    }
}

fn client_for(server: &MockServer) -> OllamaClient {
    OllamaClient::new(&config_for(server))
        .expect("Failed to create client")
        .with_retry_attempts(2)
        .with_retry_delay(Duration::ZERO)
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry, RetryPolicy::default());
    assert_eq!(client.model_name(), "test-model");
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&EmbeddingConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5)
        .with_retry_delay(Duration::from_millis(10));

    assert_eq!(client.retry.attempts, 5);
    assert_eq!(client.retry.base_delay, Duration::from_millis(10));
}

#[tokio::test(flavor = "multi_thread")]
async fn single_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "test-model", "input": ["hello"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-model",
            "embeddings": [[0.1, 0.2, 0.3]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedding = client_for(&server)
        .generate_embedding("hello")
        .expect("embedding should succeed");
    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_is_split_by_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"input": ["a", "b"]})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0, 0.0], [0.0, 1.0]]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"input": ["c"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.5, 0.5]]})))
        .expect(1)
        .mount(&server)
        .await;

    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let embeddings = client_for(&server)
        .generate_embeddings_batch(&texts)
        .expect("batch should succeed");

    assert_eq!(
        embeddings,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0]]})))
        .mount(&server)
        .await;

    let texts = vec!["a".to_string(), "b".to_string()];
    assert!(client_for(&server).generate_embeddings_batch(&texts).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "model not found"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client_for(&server).generate_embedding("hello").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    assert!(client_for(&server).generate_embedding("hello").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn model_validation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "test-model", "size": 274302450, "details": {"family": "nomic-bert"}},
                {"name": "other-model"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.5.1"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let models = client.list_models().expect("models listed");
    assert_eq!(models.len(), 2);
    assert_eq!(
        models[0].details.as_ref().and_then(|d| d.family.as_deref()),
        Some("nomic-bert")
    );
    assert!(client.health_check().is_ok());

    let mut missing = config_for(&server);
    missing.model = "absent-model".to_string();
    let client = OllamaClient::new(&missing)
        .expect("client")
        .with_retry_delay(Duration::ZERO);
    assert!(client.validate_model().is_err());
}

#[tokio::test]
async fn trait_embed_maps_failures_to_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let client: &dyn EmbeddingClient = &client_for(&server);
    let result = client.embed("hello").await;
    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[tokio::test]
async fn trait_embed_batch_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0, 2.0], [3.0, 4.0]]})),
        )
        .mount(&server)
        .await;

    let client: &dyn EmbeddingClient = &client_for(&server);
    let embeddings = client
        .embed_batch(&["x".to_string(), "y".to_string()])
        .await
        .expect("batch succeeds");
    assert_eq!(embeddings, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
}
