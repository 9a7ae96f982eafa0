// Chunk store module
// Ordered, blank-line separated chunk text backing one session


use fancy_regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::Result;
use crate::storage::{StorageBackend, StorageLocation};

/// Two or more consecutive newlines end a chunk
static CHUNK_BOUNDARY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

const CHUNK_SEPARATOR: &str = "\n\n";

/// Reads and appends the chunk text resource of a session
#[derive(Debug, Clone)]
pub struct ChunkStore {
    backend: Arc<dyn StorageBackend>,
}

impl ChunkStore {
    #[inline]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Load the chunk sequence. Fails with `NotFound` when the session has no
    /// text resource yet.
    #[inline]
    pub async fn load(&self, location: &StorageLocation) -> Result<Vec<String>> {
        let bytes = self.backend.read(&location.chunks_key()).await?;
        let text = String::from_utf8_lossy(&bytes);
        let chunks = split_chunks(&text);
        debug!("Loaded {} chunks from {}", chunks.len(), location);
        Ok(chunks)
    }

    /// Append chunks to the end of the text resource, each followed by a
    /// blank line. Prior content is left byte-for-byte intact.
    #[inline]
    pub async fn append(&self, location: &StorageLocation, chunks: &[String]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let text = serialize_chunks(chunks);
        self.backend
            .append(&location.chunks_key(), text.as_bytes())
            .await?;
        debug!("Appended {} chunks to {}", chunks.len(), location);
        Ok(())
    }

    #[inline]
    pub async fn exists(&self, location: &StorageLocation) -> Result<bool> {
        self.backend.exists(&location.chunks_key()).await
    }
}

/// Split stored text into chunks: break on runs of two or more newlines,
/// trim every piece and drop empty ones.
#[inline]
pub fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;

    for boundary in CHUNK_BOUNDARY_REGEX.find_iter(text).flatten() {
        push_trimmed(
            &mut chunks,
            text.get(start..boundary.start()).unwrap_or_default(),
        );
        start = boundary.end();
    }
    push_trimmed(&mut chunks, text.get(start..).unwrap_or_default());

    chunks
}

/// Prepare a raw chunk for storage so that it reloads as exactly one chunk.
/// Returns `None` for chunks that are empty after trimming.
#[inline]
pub fn normalize_chunk(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(CHUNK_BOUNDARY_REGEX.replace_all(trimmed, "\n").into_owned())
}

/// Text appended to the resource for a batch of chunks
#[inline]
pub fn serialize_chunks(chunks: &[String]) -> String {
    let capacity = chunks
        .iter()
        .map(|c| c.len() + CHUNK_SEPARATOR.len())
        .sum();
    chunks
        .iter()
        .fold(String::with_capacity(capacity), |mut text, chunk| {
            text.push_str(chunk);
            text.push_str(CHUNK_SEPARATOR);
            text
        })
}

fn push_trimmed(chunks: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        chunks.push(piece.to_string());
    }
}
