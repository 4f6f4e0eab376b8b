//! Core types for documents, chunks and answers

pub mod document;
pub mod response;

pub use document::{Chunk, Document, DocumentId, EmbeddedChunk, ExtractedDocument};
pub use response::{Answer, AskRequest, Source};
