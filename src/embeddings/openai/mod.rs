
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::retry::RetryPolicy;
use super::{EmbeddingClient, run_blocking};
use crate::config::EmbeddingConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Client for OpenAI-compatible `/v1/embeddings` endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    api_key: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client from config, reading the API key from the environment
    /// variable named by `api_key_env`.
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .with_context(|| {
                format!(
                    "OpenAI API key not found in environment variable {}",
                    config.api_key_env
                )
            })?;
        let base_url = config
            .base_url()
            .context("Failed to generate OpenAI URL from config")?;

        Ok(Self::with_api_key(base_url, &config.model, api_key).with_batch_size(config.batch_size))
    }

    #[inline]
    pub fn with_api_key(base_url: Url, model: &str, api_key: String) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            base_url,
            model: model.to_string(),
            batch_size: 16,
            api_key,
            agent,
            retry: RetryPolicy::default(),
        }
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry.attempts = attempts;
        self
    }

    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.request_embeddings(&[text.to_string()])?;
        embeddings.pop().context("OpenAI returned no embedding")
    }

    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            let batch = self
                .request_embeddings(chunk)
                .with_context(|| format!("Failed to process batch of {} texts", chunk.len()))?;
            results.extend(batch);
        }
        Ok(results)
    }

    fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("/v1/embeddings")
            .context("Failed to build embeddings URL")?;
        let request_json = serde_json::to_string(&EmbeddingsRequest {
            model: &self.model,
            input: texts,
        })
        .context("Failed to serialize embeddings request")?;
        let authorization = format!("Bearer {}", self.api_key);

        debug!("Requesting {} embeddings from {}", texts.len(), url);

        let response_text = self
            .retry
            .run(self.base_url.as_str(), || {
                self.agent
                    .post(url.as_str())
                    .header("Authorization", &authorization)
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embeddings")?;

        let mut response: EmbeddingsResponse =
            serde_json::from_str(&response_text).context("Failed to parse embeddings response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        response.data.sort_by_key(|item| item.index);
        Ok(response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        run_blocking(move || client.generate_embedding(&text)).await
    }

    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        run_blocking(move || client.generate_embeddings_batch(&texts)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
