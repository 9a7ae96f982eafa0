// Session index management
// Keeps each session's chunk text, vector index and manifest aligned

pub mod manifest;


use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::chunk_store::{ChunkStore, normalize_chunk, split_chunks};
use crate::embeddings::EmbeddingClient;
use crate::index::{VectorIndex, codec};
use crate::storage::{StorageBackend, StorageLocation};
use crate::{RagError, Result};

pub use manifest::{SessionManifest, Staleness, detect_staleness};

/// Result of an `add_chunks` or `rebuild` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    pub total_chunks: usize,
    pub new_chunks: usize,
    pub index_size_bytes: usize,
    pub generation: u64,
    /// The index was recomputed from the stored chunk text
    pub rebuilt: bool,
}

impl AddOutcome {
    #[inline]
    pub fn index_size_mb(&self) -> f64 {
        self.index_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Position of the chunk within its session
    pub position: usize,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Absent,
    /// One committed write
    Initialized,
    Populated,
}

impl fmt::Display for SessionState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Initialized => write!(f, "initialized"),
            Self::Populated => write!(f, "populated"),
        }
    }
}

/// Read-only consistency report for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub location: String,
    pub state: SessionState,
    pub chunk_count: usize,
    pub vector_count: usize,
    pub generation: u64,
    pub dimension: usize,
    pub consistent: bool,
    #[serde(skip)]
    pub issue: Option<Staleness>,
}

impl SessionStatus {
    #[inline]
    pub fn summary(&self) -> String {
        match self.issue {
            None => format!(
                "{}: {} ({} chunks, {} vectors, generation {})",
                self.location, self.state, self.chunk_count, self.vector_count, self.generation
            ),
            Some(issue) => format!(
                "{}: {} but inconsistent: {}",
                self.location, self.state, issue
            ),
        }
    }
}

/// Everything persisted for one session, read in one pass
struct Snapshot {
    index: Option<VectorIndex>,
    manifest: Option<SessionManifest>,
    chunks: Vec<String>,
}

impl Snapshot {
    fn staleness(&self) -> Option<Staleness> {
        detect_staleness(
            self.index.as_ref(),
            self.manifest.as_ref(),
            self.chunks.len(),
        )
    }

    /// Highest generation seen in either the index or the manifest
    fn generation(&self) -> u64 {
        let index = self.index.as_ref().map_or(0, VectorIndex::generation);
        let manifest = self.manifest.as_ref().map_or(0, |m| m.generation);
        index.max(manifest)
    }
}

/// Orchestrates chunk storage, embedding and the vector index per session.
///
/// Writes for one session are serialized by an in-process lock; writers in
/// other processes are last-writer-wins, and the manifest generation makes
/// their interleavings detectable.
#[derive(Debug)]
pub struct SessionIndexManager {
    backend: Arc<dyn StorageBackend>,
    embedder: Arc<dyn EmbeddingClient>,
    chunks: ChunkStore,
    verify_writes: bool,
    locks: LockTable,
}

impl SessionIndexManager {
    #[inline]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        embedder: Arc<dyn EmbeddingClient>,
        verify_writes: bool,
    ) -> Self {
        Self {
            chunks: ChunkStore::new(Arc::clone(&backend)),
            backend,
            embedder,
            verify_writes,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Resolve where a session's resources live. Resolved per request.
    #[inline]
    pub fn resolve_location(&self, session_id: Option<&str>) -> Result<StorageLocation> {
        StorageLocation::for_session(self.backend.kind(), session_id)
    }

    /// Embed and index new chunks, appending them to the session.
    ///
    /// Chunks are normalized first; a batch that normalizes to nothing is a
    /// no-op that reports the current totals. A stale session is rebuilt from
    /// its stored text before the new chunks are appended.
    #[inline]
    pub async fn add_chunks(
        &self,
        session_id: Option<&str>,
        raw_chunks: &[String],
    ) -> Result<AddOutcome> {
        let location = self.resolve_location(session_id)?;
        let new_chunks: Vec<String> = raw_chunks
            .iter()
            .filter_map(|raw| normalize_chunk(raw))
            .collect();

        if new_chunks.is_empty() {
            debug!("No chunks to add to {}", location);
            return self.current_totals(&location).await;
        }

        let _guard = self.lock_session(&location).await;
        let snapshot = self.load_snapshot(&location).await?;

        let mut embeddings = Vec::with_capacity(new_chunks.len());
        for chunk in &new_chunks {
            embeddings.push(self.embedder.embed(chunk).await?);
        }

        let generation = snapshot.generation() + 1;
        let stale = snapshot.staleness();
        let rebuilt = stale.is_some();

        let base = match stale {
            Some(reason) => {
                warn!("Rebuilding stale session {}: {}", location, reason);
                self.embed_index(&snapshot.chunks).await?
            }
            None => snapshot.index,
        };

        let mut index = match base {
            Some(mut index) => {
                index.append(&embeddings)?;
                index
            }
            None => VectorIndex::create(&embeddings)?,
        };
        index.set_generation(generation);

        let index_size_bytes = self.commit(&location, &index, &new_chunks).await?;

        info!(
            "Added {} chunks to {} ({} total, generation {})",
            new_chunks.len(),
            location,
            index.len(),
            generation
        );

        Ok(AddOutcome {
            total_chunks: index.len(),
            new_chunks: new_chunks.len(),
            index_size_bytes,
            generation,
            rebuilt,
        })
    }

    /// Rank a session's chunks against a query vector.
    ///
    /// A session that was never written falls back to `fallback` text, split
    /// by the chunk-boundary rule, with score `0.0`. Without a fallback it
    /// fails with [`RagError::SessionEmpty`].
    #[inline]
    pub async fn search(
        &self,
        session_id: Option<&str>,
        query: &[f32],
        k: usize,
        fallback: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let location = self.resolve_location(session_id)?;
        match self.load_index(&location).await? {
            Some(index) => self.rank(&location, &index, query, k).await,
            None => fallback_hits(&location, k, fallback),
        }
    }

    /// Embed a question with the injected client, then [`Self::search`]
    #[inline]
    pub async fn search_text(
        &self,
        session_id: Option<&str>,
        question: &str,
        k: usize,
        fallback: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let location = self.resolve_location(session_id)?;
        match self.load_index(&location).await? {
            Some(index) => {
                let query = self.embedder.embed(question).await?;
                self.rank(&location, &index, &query, k).await
            }
            None => fallback_hits(&location, k, fallback),
        }
    }

    /// Re-embed every stored chunk and replace the session's index
    #[inline]
    pub async fn rebuild(&self, session_id: Option<&str>) -> Result<AddOutcome> {
        let location = self.resolve_location(session_id)?;
        let _guard = self.lock_session(&location).await;
        let snapshot = self.load_snapshot(&location).await?;

        let Some(mut index) = self.embed_index(&snapshot.chunks).await? else {
            return Err(RagError::SessionEmpty {
                session: location.to_string(),
            });
        };
        let generation = snapshot.generation() + 1;
        index.set_generation(generation);

        let index_size_bytes = self.commit(&location, &index, &[]).await?;

        info!(
            "Rebuilt {} from {} stored chunks (generation {})",
            location,
            index.len(),
            generation
        );

        Ok(AddOutcome {
            total_chunks: index.len(),
            new_chunks: 0,
            index_size_bytes,
            generation,
            rebuilt: true,
        })
    }

    /// Report a session's counts and whether they line up
    #[inline]
    pub async fn status(&self, session_id: Option<&str>) -> Result<SessionStatus> {
        let location = self.resolve_location(session_id)?;
        let snapshot = self.load_snapshot(&location).await?;
        let issue = snapshot.staleness();

        let generation = snapshot.generation();
        let state = match (&snapshot.index, generation) {
            (None, _) => SessionState::Absent,
            (Some(_), 0 | 1) => SessionState::Initialized,
            (Some(_), _) => SessionState::Populated,
        };

        Ok(SessionStatus {
            location: location.to_string(),
            state,
            chunk_count: snapshot.chunks.len(),
            vector_count: snapshot.index.as_ref().map_or(0, VectorIndex::len),
            generation,
            dimension: snapshot.index.as_ref().map_or(0, VectorIndex::dimension),
            consistent: issue.is_none(),
            issue,
        })
    }

    async fn current_totals(&self, location: &StorageLocation) -> Result<AddOutcome> {
        let index = self.load_index(location).await?;
        let total_chunks = self.load_chunks(location).await?.len();
        Ok(AddOutcome {
            total_chunks,
            new_chunks: 0,
            index_size_bytes: index.as_ref().map_or(0, VectorIndex::serialized_size),
            generation: index.as_ref().map_or(0, VectorIndex::generation),
            rebuilt: false,
        })
    }

    async fn rank(
        &self,
        location: &StorageLocation,
        index: &VectorIndex,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let chunks = self.load_chunks(location).await?;
        let k = k.min(index.len()).min(chunks.len());

        let hits: Vec<SearchHit> = index
            .search(query, k)?
            .into_iter()
            .filter_map(|hit| {
                chunks.get(hit.position).map(|text| SearchHit {
                    position: hit.position,
                    text: text.clone(),
                    score: hit.score,
                })
            })
            .collect();

        debug!("Search in {} returned {} hits", location, hits.len());
        Ok(hits)
    }

    /// Write index, chunk text and manifest in that order, then optionally
    /// verify that the stored text lines up with the index.
    async fn commit(
        &self,
        location: &StorageLocation,
        index: &VectorIndex,
        new_chunks: &[String],
    ) -> Result<usize> {
        let bytes = codec::encode(index);
        self.backend.write(&location.index_key(), &bytes).await?;
        self.chunks.append(location, new_chunks).await?;
        SessionManifest::for_index(index, self.embedder.model_name())
            .store(self.backend.as_ref(), location)
            .await?;

        if self.verify_writes {
            let stored = self.load_chunks(location).await?.len();
            if stored != index.len() {
                error!(
                    "Session {} is inconsistent after write: {} chunks, {} vectors",
                    location,
                    stored,
                    index.len()
                );
                return Err(RagError::PartialWriteInconsistency {
                    chunks: stored,
                    vectors: index.len(),
                });
            }
        }

        Ok(bytes.len())
    }

    /// Embed chunks into a fresh index, or `None` when there are none
    async fn embed_index(&self, chunks: &[String]) -> Result<Option<VectorIndex>> {
        if chunks.is_empty() {
            return Ok(None);
        }
        let embeddings = self.embedder.embed_batch(chunks).await?;
        VectorIndex::create(&embeddings).map(Some)
    }

    /// A corrupt index or manifest is reported as missing so the session
    /// reads as stale and the next write rebuilds it
    async fn load_snapshot(&self, location: &StorageLocation) -> Result<Snapshot> {
        let index = match self.load_index(location).await {
            Ok(index) => index,
            Err(RagError::CorruptIndex(reason)) => {
                warn!("Ignoring corrupt index in {}: {}", location, reason);
                None
            }
            Err(e) => return Err(e),
        };

        let manifest = match self.backend.read(&location.manifest_key()).await {
            Ok(bytes) => match SessionManifest::decode(&bytes, location) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    warn!("Ignoring corrupt manifest in {}: {}", location, e);
                    None
                }
            },
            Err(RagError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(Snapshot {
            index,
            manifest,
            chunks: self.load_chunks(location).await?,
        })
    }

    async fn load_index(&self, location: &StorageLocation) -> Result<Option<VectorIndex>> {
        match self.backend.read(&location.index_key()).await {
            Ok(bytes) => codec::decode(&bytes).map(Some),
            Err(RagError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn load_chunks(&self, location: &StorageLocation) -> Result<Vec<String>> {
        match self.chunks.load(location).await {
            Ok(chunks) => Ok(chunks),
            Err(RagError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn lock_session(&self, location: &StorageLocation) -> SessionLock<'_> {
        let key = location.to_string();
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        SessionLock {
            locks: &self.locks,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }
}

type LockTable = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Holds one session's write lock. On release the table entry is removed
/// once no other task holds or waits on it.
struct SessionLock<'a> {
    locks: &'a LockTable,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

fn fallback_hits(
    location: &StorageLocation,
    k: usize,
    fallback: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let pieces = fallback.map(split_chunks).unwrap_or_default();
    if pieces.is_empty() {
        return Err(RagError::SessionEmpty {
            session: location.to_string(),
        });
    }

    debug!(
        "Session {} has no index, answering from fallback context",
        location
    );
    Ok(pieces
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(position, text)| SearchHit {
            position,
            text,
            score: 0.0,
        })
        .collect())
}
