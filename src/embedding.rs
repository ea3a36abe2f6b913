//! Embedding Provider
//!
//! Generates fixed-dimension embeddings for record content and queries.
//! Uses the hashing trick to produce stable vectors without maintaining a
//! vocabulary map: the same text always produces the same vector regardless
//! of what other records exist. Output is unit-normalized so a plain dot
//! product equals cosine similarity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

/// Dimensionality of the embedding vectors.
pub const EMBEDDING_DIM: usize = 384;

/// Model identifier reported in collection status.
pub const EMBEDDING_MODEL: &str = "feature-hash-v1";

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding model unavailable: {0}")]
    Unavailable(String),
    #[error("Embedding generation failed: {0}")]
    GenerationFailed(String),
}

/// Vocabulary-free hashing model. Cheap to hold, deterministic for a fixed
/// dimension (the model version).
struct HashingModel {
    dimension: usize,
}

impl HashingModel {
    fn load(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::Unavailable(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    /// Hash a token to a bucket index in `[0, dimension)`.
    fn hash_token(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    /// Term-frequency vector via feature hashing, L2-normalized. Empty input
    /// yields the zero vector.
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut tf = vec![0.0f32; self.dimension];

        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let idx = self.hash_token(&token.to_lowercase());
            tf[idx] += 1.0;
        }

        let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut tf {
                *x /= norm;
            }
        }

        tf
    }
}

/// Embedding provider instance. Owns its lazily-initialized model; pass by
/// reference (or `Arc`) to consumers instead of going through process-wide
/// state. Initialization is single-flight: concurrent callers during a cold
/// start share one in-flight load, and a failed load is retried on the next
/// call rather than cached.
pub struct EmbeddingProvider {
    model: OnceCell<HashingModel>,
    dimension: usize,
}

impl EmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimension(EMBEDDING_DIM)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            model: OnceCell::new(),
            dimension,
        }
    }

    /// Declared output dimension. Every persisted embedding must match it.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &'static str {
        EMBEDDING_MODEL
    }

    /// Idempotent, concurrency-safe model load.
    pub async fn initialize(&self) -> Result<(), EmbeddingError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<&HashingModel, EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                let model = HashingModel::load(self.dimension)?;
                info!(
                    dimension = self.dimension,
                    model = EMBEDDING_MODEL,
                    "Embedding model initialized"
                );
                Ok(model)
            })
            .await
    }

    /// Generate a unit-normalized embedding for `text`. Deterministic for a
    /// fixed model version.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = self.model().await?;
        Ok(model.embed(text))
    }
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity between two vectors, range [-1, 1]. Mismatched or empty
/// inputs score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
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

    #[tokio::test]
    async fn test_embedding_dimension() {
        let provider = EmbeddingProvider::new();
        let embedding = provider
            .generate_embedding("Hello world this is a test")
            .await
            .unwrap();
        assert_eq!(embedding.len(), provider.dimension());
    }

    #[tokio::test]
    async fn test_embedding_is_unit_normalized() {
        let provider = EmbeddingProvider::new();
        let embedding = provider
            .generate_embedding("integration by parts")
            .await
            .unwrap();
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embedding_stability() {
        let provider = EmbeddingProvider::new();
        let emb1 = provider
            .generate_embedding("The quick brown fox")
            .await
            .unwrap();

        // Unrelated texts in between must not perturb the result
        let _ = provider
            .generate_embedding("completely different words zebra giraffe quantum")
            .await;

        let emb2 = provider
            .generate_embedding("The quick brown fox")
            .await
            .unwrap();
        assert_eq!(emb1, emb2);
    }

    #[tokio::test]
    async fn test_empty_text_embeds_to_zero_vector() {
        let provider = EmbeddingProvider::new();
        let embedding = provider.generate_embedding("   ").await.unwrap();
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let provider = EmbeddingProvider::new();
        provider.initialize().await.unwrap();
        provider.initialize().await.unwrap();
        assert_eq!(provider.dimension(), EMBEDDING_DIM);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }
}
