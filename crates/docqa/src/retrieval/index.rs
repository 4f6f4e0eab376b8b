//! In-memory vector index with exact nearest-neighbour search
//!
//! Vectors are stored contiguously and searched by brute force over squared
//! Euclidean distance. Ties are broken by insertion order, so results are
//! deterministic for a given build.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use crate::types::{Chunk, DocumentId, EmbeddedChunk};

/// A chunk returned by [`VectorIndex::search`]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Matched chunk
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// Immutable set of embedded chunks
#[derive(Debug, Default)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
    dimensions: Option<usize>,
}

impl VectorIndex {
    /// Index with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from embedded chunks, taking the dimension from the
    /// first usable vector
    pub fn build(items: Vec<EmbeddedChunk>) -> Self {
        Self::build_with_dimensions(items, None)
    }

    /// Build an index whose vectors must have `declared` dimensions
    ///
    /// Chunks without an embedding are dropped. Without a declared dimension the
    /// first usable vector sets it. Vectors of any other length, and vectors
    /// holding NaN or infinity, are dropped with a warning.
    pub fn build_with_dimensions(items: Vec<EmbeddedChunk>, declared: Option<usize>) -> Self {
        let mut index = Self::empty();
        let mut missing = 0usize;
        let mut rejected = 0usize;

        for item in items {
            let Some(vector) = item.embedding else {
                missing += 1;
                continue;
            };

            if vector.is_empty() || !vector.iter().all(|v| v.is_finite()) {
                rejected += 1;
                continue;
            }

            let dims = declared.or(index.dimensions).unwrap_or(vector.len());
            if vector.len() != dims {
                tracing::warn!(
                    "Dropping chunk of '{}': {} dims, index has {}",
                    item.chunk.file_name,
                    vector.len(),
                    dims
                );
                rejected += 1;
                continue;
            }

            index.dimensions = Some(dims);
            index.vectors.extend_from_slice(&vector);
            index.chunks.push(item.chunk);
        }

        if missing > 0 || rejected > 0 {
            tracing::warn!(
                "Index built with {} chunks ({} without embedding, {} rejected)",
                index.chunks.len(),
                missing,
                rejected
            );
        } else {
            tracing::debug!("Index built with {} chunks", index.chunks.len());
        }

        index
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimensions, `None` for an empty index
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Number of distinct documents with at least one indexed chunk
    pub fn document_count(&self) -> usize {
        self.chunks.iter().map(|c| c.doc_id).collect::<HashSet<DocumentId>>().len()
    }

    /// The `k` chunks nearest to `query`, closest first
    ///
    /// Returns at most `min(k, len)` results. A query whose length differs from
    /// the index dimension, or which holds non-finite values, matches nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let Some(dims) = self.dimensions else {
            return Vec::new();
        };
        if k == 0 || query.len() != dims || !query.iter().all(|v| v.is_finite()) {
            return Vec::new();
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(dims)
            .enumerate()
            .map(|(i, v)| (squared_euclidean(query, v), i))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(distance, i)| SearchResult {
                chunk: self.chunks[i].clone(),
                distance,
            })
            .collect()
    }
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Shared handle to the currently published index
///
/// Readers take a snapshot with [`IndexHandle::load`] and keep using it even if
/// a rebuild publishes a replacement meanwhile.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<VectorIndex>>>,
}

impl IndexHandle {
    /// Handle holding `index`
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// Snapshot of the published index
    pub fn load(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.current.read())
    }

    /// Replace the published index
    pub fn publish(&self, index: VectorIndex) {
        let index = Arc::new(index);
        *self.current.write() = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunk(doc_id: DocumentId, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.chars().count(),
            file_name: format!("doc{}.txt", doc_id),
            doc_id,
        }
    }

    fn item(doc_id: DocumentId, text: &str, vector: Option<Vec<f32>>) -> EmbeddedChunk {
        EmbeddedChunk::new(chunk(doc_id, text), vector)
    }

    #[test]
    fn test_nearest_first() {
        let index = VectorIndex::build(vec![
            item(1, "far", Some(vec![10.0, 10.0])),
            item(1, "near", Some(vec![1.0, 0.0])),
            item(2, "mid", Some(vec![3.0, 3.0])),
        ]);

        let results = index.search(&[0.0, 0.0], 2);
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid"]);
        assert_eq!(results[0].distance, 1.0);
        assert_eq!(results[1].distance, 18.0);
    }

    #[test]
    fn test_k_bounds() {
        let index = VectorIndex::build(vec![
            item(1, "a", Some(vec![0.0])),
            item(1, "b", Some(vec![1.0])),
        ]);
        assert!(index.search(&[0.0], 0).is_empty());
        assert_eq!(index.search(&[0.0], 10).len(), 2);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = VectorIndex::empty();
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), None);
        assert!(index.search(&[1.0, 2.0], 4).is_empty());
    }

    #[test]
    fn test_missing_mismatched_and_non_finite_vectors_are_dropped() {
        let index = VectorIndex::build(vec![
            item(1, "ok", Some(vec![1.0, 2.0])),
            item(1, "none", None),
            item(2, "short", Some(vec![1.0])),
            item(3, "nan", Some(vec![f32::NAN, 0.0])),
            item(4, "ok2", Some(vec![0.0, 0.0])),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.dimensions(), Some(2));
        assert_eq!(index.document_count(), 2);
    }

    #[test]
    fn test_declared_dimension_survives_bad_first_vector() {
        let index = VectorIndex::build_with_dimensions(
            vec![
                item(1, "bad", Some(vec![1.0, 2.0, 3.0])),
                item(2, "a", Some(vec![0.0, 0.0])),
                item(3, "b", Some(vec![1.0, 1.0])),
            ],
            Some(2),
        );

        assert_eq!(index.len(), 2);
        assert_eq!(index.dimensions(), Some(2));
        assert_eq!(index.search(&[0.0, 0.0], 1)[0].chunk.text, "a");
    }

    #[test]
    fn test_declared_dimension_with_no_usable_vectors_is_empty() {
        let index = VectorIndex::build_with_dimensions(vec![item(1, "bad", Some(vec![1.0]))], Some(4));
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), None);
    }

    #[test]
    fn test_wrong_query_dimension_matches_nothing() {
        let index = VectorIndex::build(vec![item(1, "a", Some(vec![0.0, 0.0]))]);
        assert!(index.search(&[0.0, 0.0, 0.0], 1).is_empty());
        assert!(index.search(&[f32::INFINITY, 0.0], 1).is_empty());
    }

    #[test]
    fn test_equal_distances_keep_insertion_order() {
        let index = VectorIndex::build(vec![
            item(1, "first", Some(vec![1.0, 0.0])),
            item(2, "second", Some(vec![0.0, 1.0])),
            item(3, "third", Some(vec![-1.0, 0.0])),
        ]);

        let texts: Vec<String> = index.search(&[0.0, 0.0], 3).into_iter().map(|r| r.chunk.text).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_handle_publish_keeps_old_snapshot() {
        let handle = IndexHandle::default();
        assert!(handle.load().is_empty());

        handle.publish(VectorIndex::build(vec![item(1, "a", Some(vec![0.0]))]));
        let snapshot = handle.load();

        handle.publish(VectorIndex::empty());
        assert_eq!(snapshot.len(), 1);
        assert!(handle.load().is_empty());
    }

    proptest! {
        #[test]
        fn prop_results_sorted_and_bounded(
            vectors in prop::collection::vec(prop::collection::vec(-100.0f32..100.0, 3), 0..40),
            query in prop::collection::vec(-100.0f32..100.0, 3),
            k in 0usize..50,
        ) {
            let n = vectors.len();
            let items = vectors
                .into_iter()
                .enumerate()
                .map(|(i, v)| item(i as DocumentId, "t", Some(v)))
                .collect();
            let index = VectorIndex::build(items);
            let results = index.search(&query, k);

            prop_assert_eq!(results.len(), k.min(n));
            for pair in results.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
        }

        #[test]
        fn prop_indexed_vector_finds_itself_first(
            vectors in prop::collection::hash_set(prop::collection::vec(-50i32..50, 3), 1..30),
        ) {
            let vectors: Vec<Vec<f32>> = vectors
                .into_iter()
                .map(|v| v.into_iter().map(|x| x as f32).collect())
                .collect();
            let items = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| item(i as DocumentId, &i.to_string(), Some(v.clone())))
                .collect();
            let index = VectorIndex::build(items);

            for (i, v) in vectors.iter().enumerate() {
                let results = index.search(v, 1);
                prop_assert_eq!(results.len(), 1);
                prop_assert_eq!(results[0].chunk.doc_id, i as DocumentId);
                prop_assert_eq!(results[0].distance, 0.0);
            }
        }
    }
}
