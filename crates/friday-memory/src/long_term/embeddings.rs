//! Text embeddings for the vector index
//!
//! Two embedders share the [`Embedder`] trait:
//!
//! - [`HashingEmbedder`]: dependency-free feature hashing of word tokens.
//!   Texts sharing words land close together; there is no notion of synonyms.
//! - `FastEmbedder` (feature `embeddings`): local all-MiniLM-L6-v2 inference
//!   through `fastembed`, loaded lazily on first use.
//!
//! An index remembers which model built each collection, so switching
//! embedders on an existing index makes that collection unavailable rather
//! than silently mixing vector spaces.

use std::sync::Arc;

use async_trait::async_trait;

use crate::MemoryResult;
#[cfg(feature = "embeddings")]
use crate::MemoryError;

/// Embedding dimensions for all-MiniLM-L6-v2, also used by the hashing embedder
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Trait for generating text embeddings
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier recorded alongside each collection
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;

    /// Embed several texts
    async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// The embedder the crate was built for: fastembed with the `embeddings`
/// feature, feature hashing otherwise
pub fn default_embedder() -> Arc<dyn Embedder> {
    #[cfg(feature = "embeddings")]
    {
        Arc::new(FastEmbedder::new())
    }

    #[cfg(not(feature = "embeddings"))]
    {
        Arc::new(HashingEmbedder::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feature hashing
// ─────────────────────────────────────────────────────────────────────────────

/// Signed feature hashing over lowercase alphanumeric tokens, L2-normalized
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            name: format!("fnv1a-hashing-{dimensions}"),
        }
    }

    /// Embed without going through the async trait
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let index = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// fastembed
// ─────────────────────────────────────────────────────────────────────────────

/// Local all-MiniLM-L6-v2 embeddings
///
/// Model loading and inference are CPU bound, so both run on the blocking
/// thread pool rather than on an async worker.
#[cfg(feature = "embeddings")]
pub struct FastEmbedder {
    model: tokio::sync::RwLock<Option<Arc<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "embeddings")]
impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embeddings")]
impl FastEmbedder {
    /// Create an embedder; the model loads on first use
    pub fn new() -> Self {
        Self {
            model: tokio::sync::RwLock::new(None),
        }
    }

    /// The loaded model, loading it on first call
    async fn model(&self) -> MemoryResult<Arc<fastembed::TextEmbedding>> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        if let Some(model) = self.model.read().await.as_ref() {
            return Ok(Arc::clone(model));
        }

        let mut model_guard = self.model.write().await;
        if let Some(model) = model_guard.as_ref() {
            return Ok(Arc::clone(model));
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let model = tokio::task::spawn_blocking(|| {
            let mut init_options = InitOptions::default();
            init_options.model_name = EmbeddingModel::AllMiniLML6V2;
            init_options.show_download_progress = false;
            TextEmbedding::try_new(init_options)
        })
        .await?
        .map_err(|e| MemoryError::embedding(format!("failed to load embedding model: {e}")))?;

        tracing::info!(elapsed = ?start.elapsed(), "Embedding model loaded");
        let model = Arc::new(model);
        *model_guard = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Check if the model is loaded
    pub async fn is_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::embedding("no embedding generated"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();

        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await?
            .map_err(|e| MemoryError::embedding(format!("failed to generate embeddings: {e}")))
    }
}

/// Cosine similarity in `[-1, 1]`; 0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 1e-6);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_normalized_and_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Mixtral is a mixture-of-experts model").await.unwrap();
        let b = embedder.embed("Mixtral is a mixture-of-experts model").await.unwrap();

        assert_eq!(a.len(), EMBEDDING_DIMENSIONS);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_ranks_shared_words_closer() {
        let embedder = HashingEmbedder::default();
        let doc = embedder.embed_text("Mixtral is a mixture-of-experts model");
        let related = embedder.embed_text("mixtral");
        let unrelated = embedder.embed_text("tomorrow's weather in Lisbon");

        assert!(cosine_similarity(&doc, &related) > cosine_similarity(&doc, &unrelated));
    }

    #[test]
    fn test_hashing_embedder_case_insensitive() {
        let embedder = HashingEmbedder::new(64);
        assert_eq!(embedder.embed_text("Hello World"), embedder.embed_text("hello, world!"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert_eq!(embedder.embed_text("  ...  "), vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_default_batch_embeds_each_text() {
        let embedder = HashingEmbedder::new(16);
        let batch = embedder.embed_batch(&["one", "two"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_text("one"));
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test]
    #[ignore] // Requires model download
    async fn test_fast_embedder() {
        let embedder = FastEmbedder::new();
        let vector = embedder.embed("hello world").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(embedder.is_loaded().await);
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test(flavor = "current_thread")]
    #[ignore] // Requires model download
    async fn test_fast_embedder_keeps_runtime_responsive() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        let embedder = FastEmbedder::new();
        let vectors = embedder
            .embed_batch(&["the first sentence", "and a second one"])
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(vectors.len(), 2);
        // The single runtime thread kept scheduling other tasks while the
        // model loaded and ran
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }
}
