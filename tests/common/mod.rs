// Shared helpers for integration tests

#![allow(dead_code, reason = "each integration test binary uses a subset of the helpers")]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use vectormind::embeddings::TokenEmbedder;
use vectormind::session::SessionIndexManager;
use vectormind::storage::{LocalFilesystemBackend, ObjectStoreBackend, StorageBackend};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TEST_DIMENSION: usize = 1024;

/// Stateful in-memory object store answering GET/PUT/HEAD by URL path
#[derive(Clone, Default)]
pub struct InMemoryObjects {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryObjects {
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

impl Respond for InMemoryObjects {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        match request.method.as_str() {
            "PUT" => {
                objects.insert(path, request.body.clone());
                ResponseTemplate::new(200)
            }
            "GET" => objects.get(&path).map_or_else(
                || ResponseTemplate::new(404),
                |body| ResponseTemplate::new(200).set_body_bytes(body.clone()),
            ),
            "HEAD" => ResponseTemplate::new(if objects.contains_key(&path) {
                200
            } else {
                404
            }),
            _ => ResponseTemplate::new(405),
        }
    }
}

pub async fn start_object_store() -> (ObjectStoreBackend, MockServer, InMemoryObjects) {
    let server = MockServer::start().await;
    let objects = InMemoryObjects::default();
    Mock::given(any())
        .respond_with(objects.clone())
        .mount(&server)
        .await;

    let backend = ObjectStoreBackend::with_token(
        &server.uri(),
        "rag-bucket",
        "rag-sessions/",
        Some("test-token".to_string()),
        Duration::from_secs(5),
    )
    .expect("object store backend");

    (backend, server, objects)
}

pub fn token_manager(backend: Arc<dyn StorageBackend>) -> SessionIndexManager {
    SessionIndexManager::new(
        backend,
        Arc::new(TokenEmbedder::new("token-hash", TEST_DIMENSION)),
        true,
    )
}

pub fn local_manager(root: &std::path::Path) -> SessionIndexManager {
    token_manager(Arc::new(LocalFilesystemBackend::new(root)))
}

pub fn chunks(texts: &[&str]) -> Vec<String> {
    texts.iter().map(ToString::to_string).collect()
}
