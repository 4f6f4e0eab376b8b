//! Fixed-window text chunking with overlap and per-document caps

use serde::Serialize;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Counters collected while chunking a batch of documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkingStats {
    /// Documents handed to the chunker
    pub documents_seen: usize,
    /// Documents that produced at least one chunk
    pub documents_chunked: usize,
    /// Documents skipped (empty text or malformed metadata)
    pub documents_skipped: usize,
    /// Documents cut to `chunk_size * max_chunks` characters
    pub documents_truncated: usize,
    /// Chunks produced in total
    pub chunks_created: usize,
}

/// Sliding-window chunker
///
/// Windows are `chunk_size` chars wide and advance by `chunk_size - chunk_overlap`.
/// `chunk_overlap < chunk_size` must already hold (see [`ChunkingConfig::validate`]).
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            max_chunks: config.max_chunks,
        }
    }

    /// Chunk all documents, skipping any that fail
    pub fn process(&self, documents: &[Document]) -> Vec<Chunk> {
        self.process_with_stats(documents).0
    }

    /// Chunk all documents and report what happened
    pub fn process_with_stats(&self, documents: &[Document]) -> (Vec<Chunk>, ChunkingStats) {
        let mut stats = ChunkingStats {
            documents_seen: documents.len(),
            ..Default::default()
        };
        let mut chunks = Vec::new();

        for doc in documents {
            match self.chunk_document(doc) {
                Ok((doc_chunks, truncated)) => {
                    if truncated {
                        stats.documents_truncated += 1;
                    }
                    if doc_chunks.is_empty() {
                        tracing::debug!("Document {} ('{}') is empty, skipping", doc.id, doc.file_name);
                        stats.documents_skipped += 1;
                    } else {
                        stats.documents_chunked += 1;
                        stats.chunks_created += doc_chunks.len();
                        chunks.extend(doc_chunks);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping document {}: {}", doc.id, e);
                    stats.documents_skipped += 1;
                }
            }
        }

        (chunks, stats)
    }

    /// Chunk one document; the flag reports whether its text was truncated
    pub fn chunk_document(&self, doc: &Document) -> Result<(Vec<Chunk>, bool)> {
        if doc.file_name.trim().is_empty() {
            return Err(Error::chunking(
                format!("<document {}>", doc.id),
                "missing file name",
            ));
        }

        let text = doc.raw_text.trim();
        if text.is_empty() {
            return Ok((Vec::new(), false));
        }

        let mut chars: Vec<char> = text.chars().collect();
        let limit = self.chunk_size.saturating_mul(self.max_chunks);
        let truncated = chars.len() > limit;
        if truncated {
            tracing::warn!(
                "Truncating '{}' (doc {}) from {} to {} chars ({} chunks of {})",
                doc.file_name,
                doc.id,
                chars.len(),
                limit,
                self.max_chunks,
                self.chunk_size
            );
            chars.truncate(limit);
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() && chunks.len() < self.max_chunks {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(Chunk {
                text: chars[start..end].iter().collect(),
                start_offset: start,
                end_offset: end,
                file_name: doc.file_name.clone(),
                doc_id: doc.id,
            });

            if end == chars.len() {
                break;
            }
            start += step;
        }

        Ok((chunks, truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize, max_chunks: usize) -> TextChunker {
        TextChunker::new(&ChunkingConfig {
            chunk_size,
            chunk_overlap,
            max_chunks,
        })
    }

    #[test]
    fn test_splits_without_overlap() {
        let docs = vec![Document::new(1, "a.txt", "AAAA")];
        let chunks = chunker(2, 0, 10).process(&docs);

        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].text.as_str(), chunks[0].start_offset, chunks[0].end_offset), ("AA", 0, 2));
        assert_eq!((chunks[1].text.as_str(), chunks[1].start_offset, chunks[1].end_offset), ("AA", 2, 4));
        assert!(chunks.iter().all(|c| c.file_name == "a.txt" && c.doc_id == 1));
    }

    #[test]
    fn test_overlap_and_short_final_chunk() {
        let docs = vec![Document::new(7, "b.md", "abcdefghij")];
        let chunks = chunker(4, 1, 10).process(&docs);

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);

        let docs = vec![Document::new(7, "b.md", "abcdefghijk")];
        let chunks = chunker(4, 1, 10).process(&docs);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij", "jk"]);
    }

    #[test]
    fn test_strips_whitespace_and_skips_empty() {
        let docs = vec![
            Document::new(1, "blank.txt", "   \n\t "),
            Document::new(2, "padded.txt", "  hello  "),
        ];
        let (chunks, stats) = chunker(100, 10, 5).process_with_stats(&docs);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
        assert_eq!(stats.documents_skipped, 1);
        assert_eq!(stats.documents_chunked, 1);
    }

    #[test]
    fn test_truncation_is_counted() {
        let docs = vec![Document::new(1, "long.txt", "x".repeat(50))];
        let (chunks, stats) = chunker(10, 0, 3).process_with_stats(&docs);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.last().unwrap().end_offset, 30);
        assert_eq!(stats.documents_truncated, 1);
    }

    #[test]
    fn test_bad_document_does_not_abort_batch() {
        let docs = vec![
            Document::new(1, "", "orphan text"),
            Document::new(2, "ok.txt", "fine"),
        ];
        let (chunks, stats) = chunker(10, 0, 3).process_with_stats(&docs);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].doc_id, 2);
        assert_eq!(stats.documents_skipped, 1);
    }

    #[test]
    fn test_offsets_count_chars_not_bytes() {
        let docs = vec![Document::new(1, "u.txt", "ééééé")];
        let chunks = chunker(3, 1, 10).process(&docs);

        assert_eq!(chunks[0].text, "ééé");
        assert_eq!(chunks[1].start_offset, 2);
        assert_eq!(chunks[1].text, "ééé");
    }

    proptest! {
        #[test]
        fn prop_short_text_yields_single_stripped_chunk(text in "[a-z ]{1,40}", extra in 0usize..20) {
            let stripped = text.trim().to_string();
            prop_assume!(!stripped.is_empty());
            let size = stripped.chars().count() + extra;
            let docs = vec![Document::new(1, "p.txt", text.clone())];
            let chunks = chunker(size, 0, 4).process(&docs);

            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(&chunks[0].text, &stripped);
        }

        #[test]
        fn prop_window_invariants(
            text in "[a-zA-Z0-9]{1,400}",
            size in 1usize..40,
            overlap_seed in 0usize..40,
            max_chunks in 1usize..30,
        ) {
            let overlap = overlap_seed % size;
            let docs = vec![Document::new(3, "p.txt", text)];
            let chunks = chunker(size, overlap, max_chunks).process(&docs);

            prop_assert!(chunks.len() <= max_chunks);
            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks[0].start_offset, 0);

            for c in &chunks {
                prop_assert!(c.char_len() <= size);
                prop_assert_eq!(c.text.chars().count(), c.char_len());
            }
            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[1].start_offset, pair[0].end_offset - overlap);
                prop_assert_eq!(pair[0].char_len(), size);
            }
        }
    }
}
