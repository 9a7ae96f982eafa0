
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{BackendKind, StorageBackend};
use crate::config::StorageConfig;
use crate::{RagError, Result};

/// Upper bound on a single object body. Indexes for large sessions easily
/// exceed ureq's 10 MB default.
const MAX_OBJECT_BYTES: u64 = 1024 * 1024 * 1024;

/// HTTP object store addressed path-style: `{endpoint}/{bucket}/{prefix}{key}`.
///
/// Works against any store that speaks plain GET/PUT/HEAD on object URLs
/// (MinIO with anonymous or gateway-token access, R2/S3 behind a signing proxy).
/// There is no native append, so `append` is a read-modify-write that is not
/// atomic across concurrent writers.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    bucket_url: Url,
    prefix: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl ObjectStoreBackend {
    #[inline]
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|value| !value.trim().is_empty());
        if token.is_none() {
            debug!(
                "No object store token in ${}, sending unauthenticated requests",
                config.token_env
            );
        }

        Self::with_token(
            &config.endpoint,
            &config.bucket,
            &config.prefix,
            token,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    #[inline]
    pub fn with_token(
        endpoint: &str,
        bucket: &str,
        prefix: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let bucket = bucket.trim_matches('/');
        if bucket.is_empty() {
            return Err(RagError::Config(
                "Object store bucket cannot be empty".to_string(),
            ));
        }

        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| RagError::Config(format!("Invalid object store endpoint: {}", e)))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let bucket_url = endpoint
            .join(&format!("{}/", bucket))
            .map_err(|e| RagError::Config(format!("Invalid bucket name: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Ok(Self {
            bucket_url,
            prefix: normalize_prefix(prefix),
            token,
            agent,
        })
    }

    /// Full URL of an object key
    #[inline]
    pub fn object_url(&self, key: &str) -> Result<Url> {
        self.bucket_url
            .join(&format!("{}{}", self.prefix, key))
            .map_err(|e| RagError::Storage(format!("Invalid object key {}: {}", key, e)))
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    fn get_blocking(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(key)?;
        debug!("GET {}", url);

        match self.authorize(self.agent.get(url.as_str())).call() {
            Ok(mut response) => response
                .body_mut()
                .with_config()
                .limit(MAX_OBJECT_BYTES)
                .read_to_vec()
                .map_err(|e| RagError::Storage(format!("Failed to read body of {}: {}", url, e))),
            Err(ureq::Error::StatusCode(404)) => Err(RagError::NotFound {
                key: key.to_string(),
            }),
            Err(ureq::Error::StatusCode(code)) => Err(RagError::Storage(format!(
                "GET {} returned HTTP {}",
                url, code
            ))),
            Err(e) => Err(RagError::Storage(format!("GET {} failed: {}", url, e))),
        }
    }

    fn put_blocking(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let url = self.object_url(key)?;
        debug!("PUT {} ({} bytes)", url, bytes.len());

        self.authorize(self.agent.put(url.as_str()))
            .header("Content-Type", content_type_for(key))
            .send(bytes)
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => {
                    RagError::Storage(format!("PUT {} returned HTTP {}", url, code))
                }
                other => RagError::Storage(format!("PUT {} failed: {}", url, other)),
            })?;
        Ok(())
    }

    fn head_blocking(&self, key: &str) -> Result<bool> {
        let url = self.object_url(key)?;
        debug!("HEAD {}", url);

        match self.authorize(self.agent.head(url.as_str())).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::StatusCode(404)) => Ok(false),
            Err(ureq::Error::StatusCode(code)) => {
                warn!("HEAD {} returned HTTP {}", url, code);
                Err(RagError::Storage(format!(
                    "HEAD {} returned HTTP {}",
                    url, code
                )))
            }
            Err(e) => Err(RagError::Storage(format!("HEAD {} failed: {}", url, e))),
        }
    }

    /// ureq is blocking, so every request runs on the blocking pool
    async fn run_blocking<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || operation(&backend))
            .await
            .map_err(|e| RagError::Storage(format!("Object store task failed: {}", e)))?
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    #[inline]
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    #[inline]
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let key = key.to_string();
        self.run_blocking(move |backend| backend.get_blocking(&key))
            .await
    }

    #[inline]
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let key = key.to_string();
        let bytes = bytes.to_vec();
        self.run_blocking(move |backend| backend.put_blocking(&key, &bytes))
            .await
    }

    #[inline]
    async fn append(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let key = key.to_string();
        let bytes = bytes.to_vec();
        self.run_blocking(move |backend| {
            let mut combined = match backend.get_blocking(&key) {
                Ok(existing) => existing,
                Err(RagError::NotFound { .. }) => Vec::new(),
                Err(e) => return Err(e),
            };
            combined.extend_from_slice(&bytes);
            backend.put_blocking(&key, &combined)
        })
        .await
    }

    #[inline]
    async fn exists(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.run_blocking(move |backend| backend.head_blocking(&key))
            .await
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

fn content_type_for(key: &str) -> &'static str {
    if key.ends_with(".txt") {
        "text/plain; charset=utf-8"
    } else if key.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}
