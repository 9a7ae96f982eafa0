use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Resource not found: {key}")]
    NotFound { key: String },

    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Session '{session}' has nothing indexed")]
    SessionEmpty { session: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session is inconsistent: {chunks} chunks but {vectors} vectors")]
    PartialWriteInconsistency { chunks: usize, vectors: usize },

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunk_store;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod limits;
pub mod query;
pub mod session;
pub mod storage;
