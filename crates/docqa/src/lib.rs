//! docqa: retrieval-augmented question answering over a private document corpus
//!
//! Documents are pulled from a source, extracted to plain text, chunked, embedded
//! and held in an in-memory vector index. Questions are embedded the same way,
//! matched against the index, and answered by a generation backend that sees only
//! the retrieved passages.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{IndexReport, Pipeline, PipelineState, PipelineStatus};
pub use types::{Answer, AskRequest, Chunk, Document, EmbeddedChunk, Source};
