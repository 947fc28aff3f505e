//! Embedding generation.
//!
//! [`Embedder`] is the seam the memory store calls through. Implementations:
//!
//! - [`FastEmbedder`]: local ONNX model via `fastembed`
//! - [`OpenAiEmbedder`]: OpenAI-compatible `/v1/embeddings` endpoint
//! - [`HashEmbedder`]: deterministic feature hashing, no model required
//! - [`CachedEmbedder`]: caching decorator over any of the above

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for empty, mismatched or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// =============================================================================
// fastembed
// =============================================================================

/// Local embedding model (BGE-Small-En-V1.5, 384 dimensions).
///
/// The model is loaded lazily on first use and driven from `spawn_blocking`.
pub struct FastEmbedder {
    model: Arc<Mutex<Option<TextEmbedding>>>,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("dimensions", &Self::DIMENSIONS)
            .finish_non_exhaustive()
    }
}

impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl FastEmbedder {
    pub const DIMENSIONS: usize = 384;

    pub fn new() -> Self {
        Self {
            model: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        let mut model_guard = self.model.lock().await;
        if model_guard.is_none() {
            info!("Initializing fastembed model (BG-Small-En-V1.5)...");
            let mut options = InitOptions::new(EmbeddingModel::BGESmallENV15);
            options.show_download_progress = true;
            let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
                .await
                .context("fastembed init task failed")??;
            *model_guard = Some(model);
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.initialize().await?;

        let mut model_guard = self.model.lock().await;
        let mut owned_model = model_guard
            .take()
            .context("Model unexpectedly None during embed")?;
        let input = vec![text.to_string()];

        let (embeddings_res, returned_model) = tokio::task::spawn_blocking(move || {
            let res = owned_model.embed(input, None);
            (res, owned_model)
        })
        .await?;

        // Put the model back before surfacing any embedding error.
        *model_guard = Some(returned_model);

        embeddings_res?
            .into_iter()
            .next()
            .context("No embedding generated")
    }

    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }
}

// =============================================================================
// OpenAI-compatible HTTP API
// =============================================================================

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeddings from an OpenAI-compatible `/v1/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    requested_dimensions: Option<usize>,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    /// `dimensions` is the vector length the endpoint returns. When unset it
    /// is inferred from the OpenAI model name.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: Option<usize>,
    ) -> Self {
        let model = model.into();
        let requested_dimensions = dimensions.filter(|_| model.starts_with("text-embedding-3"));
        let dimensions = dimensions.unwrap_or_else(|| match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        });

        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model,
            dimensions,
            requested_dimensions,
        }
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.model,
            input: vec![text],
            // Only the text-embedding-3 family accepts a shortened length.
            dimensions: self.requested_dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let body = self.request(text);

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp: EmbeddingResponse = rb.send().await?.error_for_status()?.json().await?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("No embedding returned")
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// =============================================================================
// Feature hashing
// =============================================================================

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed to a signed slot; the result is
/// L2-normalized. Texts sharing vocabulary land close together, which is
/// enough for development setups and tests without a model download.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut slot = [0_u8; 8];
            slot.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(slot) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Caches embeddings by SHA-256 of the input text.
///
/// When full, half of the entries are evicted in arbitrary order.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: RwLock<HashMap<String, Vec<f32>>>,
    max_entries: usize,
}

impl std::fmt::Debug for CachedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("inner", &self.inner)
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, max_entries: usize) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cache_key(text: &str) -> String {
        hex::encode(Sha256::digest(text.as_bytes()))
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.cache.read().ok()?.get(key).cloned()
    }

    fn put(&self, key: String, embedding: Vec<f32>) {
        if let Ok(mut cache) = self.cache.write() {
            if cache.len() >= self.max_entries {
                let evict: Vec<_> = cache
                    .keys()
                    .take((self.max_entries / 2).max(1))
                    .cloned()
                    .collect();
                for k in evict {
                    cache.remove(&k);
                }
            }
            cache.insert(key, embedding);
        }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::cache_key(text);
        if let Some(hit) = self.get(&key) {
            debug!(name: "embedding.cache.hit", "Embedding cache hit");
            return Ok(hit);
        }

        let embedding = self.inner.embed(text).await?;
        self.put(key, embedding.clone());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
