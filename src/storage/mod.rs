// Storage module
// Pluggable persistence for session resources (local filesystem or HTTP object store)


pub mod local;
pub mod object_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;
use crate::{RagError, Result};

pub use local::LocalFilesystemBackend;
pub use object_store::ObjectStoreBackend;

/// File name of the serialized vector index inside a session prefix
pub const INDEX_FILE: &str = "index.bin";
/// File name of the blank-line separated chunk text inside a session prefix
pub const CHUNKS_FILE: &str = "text_chunks.txt";
/// File name of the session manifest inside a session prefix
pub const MANIFEST_FILE: &str = "manifest.json";

const DEFAULT_SESSION_PREFIX: &str = "default/";
const SESSIONS_DIR: &str = "sessions";
const MAX_SESSION_ID_LEN: usize = 128;

/// Which kind of backend is active for this deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Local,
    ObjectStore,
}

impl fmt::Display for BackendKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::ObjectStore => write!(f, "object_store"),
        }
    }
}

/// Byte-level persistence contract shared by every backend.
///
/// Keys are `/`-separated relative paths such as `sessions/abc/index.bin`.
/// `read` fails with [`RagError::NotFound`] when the key does not exist.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn append(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Where one session's resources live within the active backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub backend: BackendKind,
    /// Key prefix ending in `/`, e.g. `sessions/abc/` or `default/`
    pub prefix: String,
}

impl StorageLocation {
    /// Derive the location for a session id. Blank or absent ids map to the
    /// default (global) namespace.
    #[inline]
    pub fn for_session(backend: BackendKind, session_id: Option<&str>) -> Result<Self> {
        let prefix = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            None => DEFAULT_SESSION_PREFIX.to_string(),
            Some(id) => {
                validate_session_id(id)?;
                format!("{}/{}/", SESSIONS_DIR, id)
            }
        };
        Ok(Self { backend, prefix })
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        self.prefix == DEFAULT_SESSION_PREFIX
    }

    #[inline]
    pub fn index_key(&self) -> String {
        format!("{}{}", self.prefix, INDEX_FILE)
    }

    #[inline]
    pub fn chunks_key(&self) -> String {
        format!("{}{}", self.prefix, CHUNKS_FILE)
    }

    #[inline]
    pub fn manifest_key(&self) -> String {
        format!("{}{}", self.prefix, MANIFEST_FILE)
    }
}

impl fmt::Display for StorageLocation {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.prefix)
    }
}

/// Session ids become path segments and URL path components, so only a
/// conservative character set is accepted.
fn validate_session_id(id: &str) -> Result<()> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if id.len() > MAX_SESSION_ID_LEN || !valid_chars || id.contains("..") || id == "." {
        return Err(RagError::InvalidSessionId(id.to_string()));
    }
    Ok(())
}

/// Build the configured backend once at startup
#[inline]
pub fn build_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        BackendKind::Local => Arc::new(LocalFilesystemBackend::new(&config.local_root)),
        BackendKind::ObjectStore => Arc::new(ObjectStoreBackend::new(config)?),
    };
    info!("Using {} storage backend", backend.kind());
    Ok(backend)
}
