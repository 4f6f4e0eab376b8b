//! Vector index and retrieval

mod index;
mod retriever;

pub use index::{IndexHandle, SearchResult, VectorIndex};
pub use retriever::Retriever;
