//! Document and chunk types with provenance for source attribution

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifier of a source document (relational row id or walk position)
pub type DocumentId = i64;

/// A raw document as supplied by a [`DocumentSource`](crate::ingestion::DocumentSource)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Source-assigned identifier
    pub id: DocumentId,
    /// File name used for attribution
    pub file_name: String,
    /// Unprocessed text content
    pub raw_text: String,
}

impl Document {
    /// Create a new document
    pub fn new(id: DocumentId, file_name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Lowercased file extension, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Output of the extractor: plain text plus a display title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Source-assigned identifier
    pub id: DocumentId,
    /// File name used for attribution
    pub file_name: String,
    /// First heading or title element, else the file stem
    pub title: String,
    /// Extracted plain text
    pub text: String,
}

impl ExtractedDocument {
    /// Convert back into a [`Document`] carrying the extracted text
    pub fn into_document(self) -> Document {
        Document {
            id: self.id,
            file_name: self.file_name,
            raw_text: self.text,
        }
    }
}

/// A bounded slice of a document's text
///
/// Offsets count chars (Unicode scalar values) into the stripped document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub text: String,
    /// Start offset (inclusive)
    pub start_offset: usize,
    /// End offset (exclusive)
    pub end_offset: usize,
    /// Source file name
    pub file_name: String,
    /// Source document id
    pub doc_id: DocumentId,
}

impl Chunk {
    /// Length of the chunk in chars
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// First `max_chars` chars of the chunk text
    pub fn snippet(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}

/// A chunk paired with its embedding, `None` when embedding failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// The chunk
    pub chunk: Chunk,
    /// Embedding vector, absent on per-item failure
    pub embedding: Option<Vec<f32>>,
}

impl EmbeddedChunk {
    /// Pair a chunk with an embedding result
    pub fn new(chunk: Chunk, embedding: Option<Vec<f32>>) -> Self {
        Self { chunk, embedding }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        let doc = Document::new(1, "Notes.MD", "# hi");
        assert_eq!(doc.extension().as_deref(), Some("md"));

        let doc = Document::new(2, "README", "text");
        assert_eq!(doc.extension(), None);
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let chunk = Chunk {
            text: "héllo wörld".to_string(),
            start_offset: 0,
            end_offset: 11,
            file_name: "a.txt".to_string(),
            doc_id: 1,
        };
        assert_eq!(chunk.snippet(4), "héll");
        assert_eq!(chunk.snippet(100), "héllo wörld");
    }
}
