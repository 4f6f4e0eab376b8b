//! Request and response types for question answering

use serde::{Deserialize, Serialize};

use super::document::{Chunk, DocumentId};

/// Question submitted to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question to answer
    pub question: String,
    /// Number of chunks to retrieve (falls back to `retrieval.top_k_results`)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl AskRequest {
    /// Create a new request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
        }
    }

    /// Set the number of results to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }
}

/// A passage that grounded the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Source file name
    pub file_name: String,
    /// Source document id
    pub doc_id: DocumentId,
    /// Leading characters of the retrieved chunk
    pub text_snippet: String,
}

impl Source {
    /// Build a source entry from a chunk, keeping the first `snippet_chars` chars
    pub fn from_chunk(chunk: &Chunk, snippet_chars: usize) -> Self {
        Self {
            file_name: chunk.file_name.clone(),
            doc_id: chunk.doc_id,
            text_snippet: chunk.snippet(snippet_chars),
        }
    }
}

/// Answer to a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated answer text
    #[serde(rename = "answer")]
    pub text: String,
    /// Passages the answer was grounded on
    pub sources: Vec<Source>,
}

impl Answer {
    /// Message returned when retrieval found nothing to ground an answer on
    pub const NO_CONTEXT: &'static str =
        "I could not find any relevant information in the indexed documents to answer this question.";

    /// Create an answer
    pub fn new(text: String, sources: Vec<Source>) -> Self {
        Self { text, sources }
    }

    /// Answer used when retrieval returned nothing
    pub fn no_context() -> Self {
        Self {
            text: Self::NO_CONTEXT.to_string(),
            sources: Vec::new(),
        }
    }
}
