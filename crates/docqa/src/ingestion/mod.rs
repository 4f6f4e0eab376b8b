//! Document ingestion: sources, text extraction and chunking

mod chunker;
mod extractor;
mod source;

pub use chunker::{ChunkingStats, TextChunker};
pub use extractor::{Extractor, TextFormat};
pub use source::{
    source_from_config, DirectoryDocumentSource, DocumentSource, InMemorySource,
    SqliteDocumentSource,
};
