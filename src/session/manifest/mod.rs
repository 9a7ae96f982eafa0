#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::index::VectorIndex;
use crate::storage::{StorageBackend, StorageLocation};
use crate::{RagError, Result};

/// Commit record written beside a session's index after every successful
/// write. The generation must match the one in the index header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub generation: u64,
    pub chunk_count: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub updated_at: DateTime<Utc>,
}

impl SessionManifest {
    #[inline]
    pub fn for_index(index: &VectorIndex, embedding_model: &str) -> Self {
        Self {
            generation: index.generation(),
            chunk_count: index.len(),
            dimension: index.dimension(),
            embedding_model: embedding_model.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[inline]
    pub async fn load(
        backend: &dyn StorageBackend,
        location: &StorageLocation,
    ) -> Result<Option<Self>> {
        match backend.read(&location.manifest_key()).await {
            Ok(bytes) => Self::decode(&bytes, location).map(Some),
            Err(RagError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parse manifest bytes read from `location`
    #[inline]
    pub fn decode(bytes: &[u8], location: &StorageLocation) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            RagError::Storage(format!("Invalid session manifest at {}: {}", location, e))
        })
    }

    #[inline]
    pub async fn store(
        &self,
        backend: &dyn StorageBackend,
        location: &StorageLocation,
    ) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| RagError::Storage(format!("Failed to encode session manifest: {}", e)))?;
        backend.write(&location.manifest_key(), &bytes).await
    }
}

/// Why a session's index can no longer be trusted to line up with its text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Chunk text exists but the index does not
    MissingIndex { chunks: usize },
    /// An index exists without a commit record
    MissingManifest,
    /// The last write did not finish committing
    GenerationMismatch { index: u64, manifest: u64 },
    /// Stored chunks, recorded chunks and vectors disagree
    CountMismatch { chunks: usize, vectors: usize },
}

impl fmt::Display for Staleness {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIndex { chunks } => {
                write!(f, "index missing for {} stored chunks", chunks)
            }
            Self::MissingManifest => write!(f, "index has no manifest"),
            Self::GenerationMismatch { index, manifest } => write!(
                f,
                "index generation {} does not match manifest generation {}",
                index, manifest
            ),
            Self::CountMismatch { chunks, vectors } => {
                write!(f, "{} stored chunks but {} vectors", chunks, vectors)
            }
        }
    }
}

/// Compare a session's index, manifest and stored chunk count
#[inline]
pub fn detect_staleness(
    index: Option<&VectorIndex>,
    manifest: Option<&SessionManifest>,
    stored_chunks: usize,
) -> Option<Staleness> {
    let Some(index) = index else {
        return (stored_chunks > 0).then_some(Staleness::MissingIndex {
            chunks: stored_chunks,
        });
    };

    let Some(manifest) = manifest else {
        return Some(Staleness::MissingManifest);
    };

    if manifest.generation != index.generation() {
        return Some(Staleness::GenerationMismatch {
            index: index.generation(),
            manifest: manifest.generation,
        });
    }

    if stored_chunks != index.len() || manifest.chunk_count != index.len() {
        return Some(Staleness::CountMismatch {
            chunks: stored_chunks,
            vectors: index.len(),
        });
    }

    None
}
