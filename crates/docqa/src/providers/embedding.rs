//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OnnxEmbedder`: local sentence-transformer, whole batches per call
/// - `ConcurrentEmbedder`: one request per text against an embedding service
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    ///
    /// The output has one slot per input, in input order; `None` marks a text
    /// whose embedding failed. An `Err` means the whole call failed.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>>;

    /// Embedding dimensions, when known ahead of the first call
    fn dimensions(&self) -> Option<usize>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
