
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::EmbeddingClient;

/// Offline embedder hashing lowercase word tokens into a fixed number of
/// buckets (bag of words, term-frequency weighted, L2-normalized).
///
/// Deterministic for a given build and needs no model or network, which makes
/// it suitable for tests and air-gapped demos. Texts sharing words score
/// higher than texts that do not.
#[derive(Debug, Clone)]
pub struct TokenEmbedder {
    model: String,
    dimension: usize,
}

impl TokenEmbedder {
    #[inline]
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension: dimension.max(1),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        let tokens: Vec<String> = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();

        if tokens.is_empty() {
            return embedding;
        }

        for token in &tokens {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            if let Some(slot) = embedding.get_mut(bucket) {
                *slot += 1.0;
            }
        }

        let total_tokens = tokens.len() as f32;
        for value in &mut embedding {
            *value /= total_tokens;
        }

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for TokenEmbedder {
    async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(self.generate_embedding(text))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
