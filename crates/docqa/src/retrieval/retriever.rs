//! Query embedding plus nearest-neighbour search

use std::sync::Arc;

use crate::providers::EmbeddingProvider;

use super::index::{IndexHandle, SearchResult};

/// Embeds a question and searches the published index
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: IndexHandle,
}

impl Retriever {
    /// Create a retriever over `index`
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: IndexHandle) -> Self {
        Self { embedder, index }
    }

    /// The `k` chunks closest to `question`
    ///
    /// A failed question embedding yields no results instead of an error.
    pub async fn retrieve(&self, question: &str, k: usize) -> Vec<SearchResult> {
        let query = match self.embedder.embed_one(question).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!("Query embedding failed, answering without context: {}", e);
                return Vec::new();
            }
        };

        let index = self.index.load();
        let results = index.search(&query, k);

        tracing::debug!(
            "Retrieved {} of {} chunks (k={}, best distance {:?})",
            results.len(),
            index.len(),
            k,
            results.first().map(|r| r.distance)
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::retrieval::VectorIndex;
    use crate::types::{Chunk, EmbeddedChunk};
    use async_trait::async_trait;

    /// Maps a text to `[len, 0]`; "fail" errors
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            if text == "fail" {
                return Err(Error::upstream("test", 503, "down"));
            }
            Ok(vec![text.len() as f32, 0.0])
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed_one(text).await.ok());
            }
            Ok(out)
        }

        fn dimensions(&self) -> Option<usize> {
            Some(2)
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    fn indexed(texts: &[&str]) -> IndexHandle {
        let items = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let chunk = Chunk {
                    text: t.to_string(),
                    start_offset: 0,
                    end_offset: t.len(),
                    file_name: "f.txt".to_string(),
                    doc_id: i as i64,
                };
                EmbeddedChunk::new(chunk, Some(vec![t.len() as f32, 0.0]))
            })
            .collect();
        IndexHandle::new(VectorIndex::build(items))
    }

    #[tokio::test]
    async fn test_retrieves_closest_chunks() {
        let retriever = Retriever::new(Arc::new(LengthEmbedder), indexed(&["a", "abcd", "abcdefgh"]));

        let results = retriever.retrieve("xyz", 2).await;
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "a"]);
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_empty() {
        let retriever = Retriever::new(Arc::new(LengthEmbedder), indexed(&["a"]));
        assert!(retriever.retrieve("fail", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_sees_newly_published_index() {
        let handle = IndexHandle::default();
        let retriever = Retriever::new(Arc::new(LengthEmbedder), handle.clone());
        assert!(retriever.retrieve("q", 1).await.is_empty());

        handle.publish(VectorIndex::build(vec![EmbeddedChunk::new(
            Chunk {
                text: "q".to_string(),
                start_offset: 0,
                end_offset: 1,
                file_name: "q.txt".to_string(),
                doc_id: 1,
            },
            Some(vec![1.0, 0.0]),
        )]));
        assert_eq!(retriever.retrieve("q", 1).await.len(), 1);
    }
}
