// Embeddings module
// Embedding clients (Ollama, OpenAI, offline token hashing) and document splitting

pub mod chunking;
pub mod ollama;
pub mod openai;
mod retry;
pub mod token;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::{RagError, Result};

pub use chunking::{ChunkingConfig, split_text};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use token::TokenEmbedder;

/// Converts text into a fixed-dimension vector.
///
/// Implementations must return vectors of the same length for every input.
/// Transient failures surface as [`RagError::Embedding`] after the client's
/// own retry policy is exhausted.
#[async_trait]
pub trait EmbeddingClient: Send + Sync + fmt::Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str;
}

/// Build the configured embedding client once at startup
#[inline]
pub fn build_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    let client: Arc<dyn EmbeddingClient> = match config.provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaClient::new(config)?),
        EmbeddingProvider::OpenAi => Arc::new(OpenAiClient::new(config)?),
        EmbeddingProvider::Token => Arc::new(TokenEmbedder::new(
            config.model.clone(),
            config.embedding_dimension as usize,
        )),
    };
    info!(
        "Using {} embeddings with model {}",
        config.provider,
        client.model_name()
    );
    Ok(client)
}

/// Run a blocking client call on the blocking thread pool
pub(crate) async fn run_blocking<T, F>(operation: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
        .map_err(|e| RagError::Embedding(format!("{:#}", e)))
}
