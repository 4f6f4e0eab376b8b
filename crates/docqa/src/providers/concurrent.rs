//! Concurrent embedding strategy: one round trip per text
//!
//! `embed_many` fans every text out at once, but a semaphore keeps at most
//! `max_concurrency` requests in flight. Each request has its own timeout and
//! retry budget; a text that exhausts its retries leaves `None` in its slot
//! without disturbing the others.

use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::retry::{retry, timed_out, BackoffPolicy};

use super::embedding::EmbeddingProvider;

/// A single embedding round trip to an external service
///
/// One call is one attempt; retries and timeouts are applied by
/// [`ConcurrentEmbedder`].
#[async_trait]
pub trait EmbeddingTransport: Send + Sync {
    /// Request the embedding of one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}

/// Embedding provider issuing bounded concurrent requests through a transport
pub struct ConcurrentEmbedder<T> {
    transport: T,
    max_concurrency: usize,
    request_timeout: Duration,
    backoff: BackoffPolicy,
    dimensions: Option<usize>,
}

impl<T: EmbeddingTransport> ConcurrentEmbedder<T> {
    /// Create a new concurrent embedder
    pub fn new(transport: T, max_concurrency: usize, request_timeout: Duration, backoff: BackoffPolicy) -> Self {
        Self {
            transport,
            max_concurrency: max_concurrency.max(1),
            request_timeout,
            backoff,
            dimensions: None,
        }
    }

    /// Declare the expected vector dimensions
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Maximum simultaneous in-flight requests
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// One text with timeout and retries
    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let label = format!("{} embedding request", self.transport.name());
        let what = label.as_str();

        retry(&self.backoff, what, move |_| async move {
            match timeout(self.request_timeout, self.transport.embed(text)).await {
                Ok(result) => result,
                Err(_) => Err(timed_out(what)),
            }
        })
        .await
    }
}

#[async_trait]
impl<T: EmbeddingTransport> EmbeddingProvider for ConcurrentEmbedder<T> {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_retry(text).await
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts via {} ({} concurrent)",
            texts.len(),
            self.transport.name(),
            self.max_concurrency
        );

        let semaphore = Semaphore::new(self.max_concurrency);

        let futures = texts.iter().enumerate().map(|(i, text)| {
            let semaphore = &semaphore;
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        tracing::error!("Embedding gate closed for item {}: {}", i, e);
                        return None;
                    }
                };

                match self.embed_with_retry(text).await {
                    Ok(vector) => Some(vector),
                    Err(e) => {
                        tracing::warn!("Embedding failed for item {}: {}", i, e);
                        None
                    }
                }
            }
        });

        // join_all yields results in input order, whatever the completion order
        let results = join_all(futures).await;

        let failed = results.iter().filter(|r| r.is_none()).count();
        if failed > 0 {
            tracing::warn!("{} of {} embeddings failed", failed, texts.len());
        }

        Ok(results)
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn name(&self) -> &str {
        self.transport.name()
    }
}

/// Reject empty vectors in an otherwise successful response
pub(crate) fn non_empty(vector: Vec<f32>, service: &str) -> Result<Vec<f32>> {
    if vector.is_empty() {
        Err(Error::malformed(format!("{} returned an empty embedding", service)))
    } else {
        Ok(vector)
    }
}
