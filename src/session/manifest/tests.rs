use super::*;
use crate::storage::{BackendKind, LocalFilesystemBackend};
use tempfile::TempDir;

fn index_with(count: usize, generation: u64) -> VectorIndex {
    let embeddings: Vec<Vec<f32>> = (0..count).map(|i| vec![1.0, i as f32]).collect();
    let mut index = VectorIndex::create(&embeddings).expect("create");
    index.set_generation(generation);
    index
}

#[test]
fn manifest_mirrors_index() {
    let index = index_with(3, 4);
    let manifest = SessionManifest::for_index(&index, "nomic-embed-text:latest");

    assert_eq!(manifest.generation, 4);
    assert_eq!(manifest.chunk_count, 3);
    assert_eq!(manifest.dimension, 2);
    assert_eq!(manifest.embedding_model, "nomic-embed-text:latest");
}

#[tokio::test]
async fn store_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("temp dir");
    let backend = LocalFilesystemBackend::new(temp_dir.path());
    let location = StorageLocation::for_session(BackendKind::Local, Some("m1")).expect("location");

    assert_eq!(
        SessionManifest::load(&backend, &location)
            .await
            .expect("load"),
        None
    );

    let manifest = SessionManifest::for_index(&index_with(2, 1), "token-hash");
    manifest.store(&backend, &location).await.expect("store");

    let loaded = SessionManifest::load(&backend, &location)
        .await
        .expect("load")
        .expect("manifest exists");
    assert_eq!(loaded, manifest);

    let raw = std::fs::read_to_string(temp_dir.path().join("sessions/m1/manifest.json"))
        .expect("manifest on disk");
    assert!(raw.contains("\"generation\": 1"));
}

#[tokio::test]
async fn corrupt_manifest_is_a_storage_error() {
    let temp_dir = TempDir::new().expect("temp dir");
    let backend = LocalFilesystemBackend::new(temp_dir.path());
    let location = StorageLocation::for_session(BackendKind::Local, None).expect("location");
    backend
        .write(&location.manifest_key(), b"{not json")
        .await
        .expect("write");

    let result = SessionManifest::load(&backend, &location).await;
    assert!(matches!(result, Err(RagError::Storage(_))));
}

#[test]
fn fresh_session_is_not_stale() {
    assert_eq!(detect_staleness(None, None, 0), None);
}

#[test]
fn committed_session_is_not_stale() {
    let index = index_with(3, 2);
    let manifest = SessionManifest::for_index(&index, "m");
    assert_eq!(detect_staleness(Some(&index), Some(&manifest), 3), None);
}

#[test]
fn chunks_without_index_are_stale() {
    assert_eq!(
        detect_staleness(None, None, 4),
        Some(Staleness::MissingIndex { chunks: 4 })
    );
}

#[test]
fn index_without_manifest_is_stale() {
    let index = index_with(2, 1);
    assert_eq!(
        detect_staleness(Some(&index), None, 2),
        Some(Staleness::MissingManifest)
    );
}

#[test]
fn interrupted_write_is_stale() {
    let committed = index_with(2, 1);
    let manifest = SessionManifest::for_index(&committed, "m");
    let written = index_with(3, 2);

    assert_eq!(
        detect_staleness(Some(&written), Some(&manifest), 2),
        Some(Staleness::GenerationMismatch {
            index: 2,
            manifest: 1
        })
    );
}

#[test]
fn count_drift_is_stale() {
    let index = index_with(3, 1);
    let manifest = SessionManifest::for_index(&index, "m");

    assert_eq!(
        detect_staleness(Some(&index), Some(&manifest), 5),
        Some(Staleness::CountMismatch {
            chunks: 5,
            vectors: 3
        })
    );
}

#[test]
fn staleness_descriptions() {
    assert_eq!(
        Staleness::CountMismatch {
            chunks: 5,
            vectors: 3
        }
        .to_string(),
        "5 stored chunks but 3 vectors"
    );
    assert_eq!(
        Staleness::MissingManifest.to_string(),
        "index has no manifest"
    );
}
