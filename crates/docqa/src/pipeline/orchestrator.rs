//! Pipeline lifecycle: index builds and question answering
//!
//! A build runs source -> extraction -> chunking -> embedding -> index and then
//! publishes the new index in one swap. Queries always read a complete index.
//! When a rebuild fails, the previously published index keeps serving and the
//! state reports `Failed` until the next successful build.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::{RagConfig, RetrievalConfig};
use crate::error::{Error, Result};
use crate::generation::AnswerGenerator;
use crate::ingestion::{source_from_config, ChunkingStats, DocumentSource, Extractor, TextChunker};
use crate::providers::{backend_from_config, embedder_from_config, EmbeddingProvider, GenerationBackend};
use crate::retrieval::{IndexHandle, Retriever, VectorIndex};
use crate::types::{Answer, Chunk, Document, EmbeddedChunk, Source};

/// Lifecycle state of a [`Pipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// No build has been started
    Uninitialized,
    /// A build is running
    Indexing,
    /// The last build succeeded
    Ready,
    /// The last build failed
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one index build
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    /// Documents returned by the source
    pub documents_loaded: usize,
    /// Documents with extracted text
    pub documents_extracted: usize,
    /// Documents of an unsupported type
    pub documents_unsupported: usize,
    /// Documents whose extraction failed
    pub extraction_failures: usize,
    /// Chunker counters
    pub chunking: ChunkingStats,
    /// Chunks whose embedding failed
    pub embedding_failures: usize,
    /// Chunks in the published index
    pub indexed_chunks: usize,
    /// Distinct documents in the published index
    pub indexed_documents: usize,
    /// Vector dimensions, `None` for an empty index
    pub dimensions: Option<usize>,
    /// Wall-clock build time
    pub duration_ms: u64,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
}

/// Snapshot of pipeline health
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    /// Lifecycle state
    pub status: PipelineState,
    /// Distinct documents in the serving index
    pub indexed_documents: usize,
    /// Chunks in the serving index
    pub indexed_chunks: usize,
    /// Embedding provider name
    pub embedding_provider: String,
    /// Generation backend name
    pub generation_backend: String,
    /// Generation model
    pub generation_model: String,
    /// Error of the last failed build
    pub last_error: Option<String>,
    /// Report of the last successful build
    pub last_report: Option<IndexReport>,
}

#[derive(Debug)]
struct Lifecycle {
    state: PipelineState,
    published: bool,
    last_error: Option<String>,
    last_report: Option<IndexReport>,
}

/// Marks the pipeline `Failed` if a build future is dropped before it settles
struct BuildGuard<'a> {
    lifecycle: &'a RwLock<Lifecycle>,
    settled: bool,
}

impl<'a> BuildGuard<'a> {
    fn start(lifecycle: &'a RwLock<Lifecycle>) -> Self {
        lifecycle.write().state = PipelineState::Indexing;
        Self {
            lifecycle,
            settled: false,
        }
    }

    fn settle(mut self) -> &'a RwLock<Lifecycle> {
        self.settled = true;
        self.lifecycle
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!("Index build cancelled before completion");
        let mut lifecycle = self.lifecycle.write();
        lifecycle.state = PipelineState::Failed;
        lifecycle.last_error = Some("index build cancelled before completion".to_string());
    }
}

/// Retrieval-augmented question answering over one document source
pub struct Pipeline {
    retrieval: RetrievalConfig,
    source: Arc<dyn DocumentSource>,
    extractor: Extractor,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    generator: AnswerGenerator,
    index: IndexHandle,
    lifecycle: RwLock<Lifecycle>,
    build_lock: Mutex<()>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators
    pub fn new(
        config: &RagConfig,
        source: Arc<dyn DocumentSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Result<Self> {
        config.chunking.validate()?;
        config.retrieval.validate()?;

        let index = IndexHandle::default();

        Ok(Self {
            retrieval: config.retrieval,
            source,
            extractor: Extractor::new()?,
            chunker: TextChunker::new(&config.chunking),
            retriever: Retriever::new(Arc::clone(&embedder), index.clone()),
            embedder,
            generator: AnswerGenerator::new(backend),
            index,
            lifecycle: RwLock::new(Lifecycle {
                state: PipelineState::Uninitialized,
                published: false,
                last_error: None,
                last_report: None,
            }),
            build_lock: Mutex::new(()),
        })
    }

    /// Validate `config` and build every collaborator it names
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        config.validate()?;
        config.source.check_paths()?;

        let source: Arc<dyn DocumentSource> = Arc::from(source_from_config(&config.source));
        let embedder = embedder_from_config(&config.embeddings).await?;
        let backend = backend_from_config(&config.generation)?;

        Self::new(config, source, embedder, backend)
    }

    /// Rebuild the index from the source and publish it
    ///
    /// Builds are serialized; a second call waits for the first to finish.
    /// Dropping the returned future mid-build leaves the state `Failed` and the
    /// previous index serving.
    pub async fn build_index(&self) -> Result<IndexReport> {
        let _lock = self.build_lock.lock().await;
        let guard = BuildGuard::start(&self.lifecycle);

        let started = Instant::now();
        tracing::info!("Index build started (source: {})", self.source.name());

        let outcome = self.run_build().await;
        let lifecycle = guard.settle();

        match outcome {
            Ok((index, mut report)) => {
                report.indexed_chunks = index.len();
                report.indexed_documents = index.document_count();
                report.dimensions = index.dimensions();
                report.duration_ms = started.elapsed().as_millis() as u64;
                report.completed_at = Some(Utc::now());

                self.index.publish(index);

                let mut lifecycle = lifecycle.write();
                lifecycle.state = PipelineState::Ready;
                lifecycle.published = true;
                lifecycle.last_error = None;
                lifecycle.last_report = Some(report.clone());

                tracing::info!(
                    "Index ready: {} chunks from {} documents in {}ms",
                    report.indexed_chunks,
                    report.indexed_documents,
                    report.duration_ms
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Index build failed: {}", e);
                let mut lifecycle = lifecycle.write();
                lifecycle.state = PipelineState::Failed;
                lifecycle.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_build(&self) -> Result<(VectorIndex, IndexReport)> {
        let mut report = IndexReport::default();

        let documents = self.source.load_documents().await?;
        report.documents_loaded = documents.len();
        if documents.is_empty() {
            tracing::info!("Source returned no documents, publishing an empty index");
            return Ok((VectorIndex::empty(), report));
        }

        let extracted = self.extract_all(&documents, &mut report);
        if extracted.is_empty() {
            tracing::info!("No document produced text, publishing an empty index");
            return Ok((VectorIndex::empty(), report));
        }

        let (chunks, stats) = self.chunker.process_with_stats(&extracted);
        report.chunking = stats;
        if chunks.is_empty() {
            tracing::info!("No chunks produced, publishing an empty index");
            return Ok((VectorIndex::empty(), report));
        }
        tracing::info!(
            "Chunked {} documents into {} chunks ({} truncated)",
            stats.documents_chunked,
            stats.chunks_created,
            stats.documents_truncated
        );

        let embedded = self.embed_chunks(chunks).await?;
        report.embedding_failures = embedded.iter().filter(|e| e.embedding.is_none()).count();

        Ok((
            VectorIndex::build_with_dimensions(embedded, self.embedder.dimensions()),
            report,
        ))
    }

    fn extract_all(&self, documents: &[Document], report: &mut IndexReport) -> Vec<Document> {
        let mut extracted = Vec::with_capacity(documents.len());

        for doc in documents {
            match self.extractor.extract(doc) {
                Ok(Some(text)) => extracted.push(text.into_document()),
                Ok(None) => report.documents_unsupported += 1,
                Err(e) => {
                    tracing::warn!("Extraction failed for document {}: {}", doc.id, e);
                    report.extraction_failures += 1;
                }
            }
        }

        report.documents_extracted = extracted.len();
        extracted
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_many(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "{} returned {} results for {} texts",
                self.embedder.name(),
                vectors.len(),
                chunks.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
            .collect())
    }

    /// Answer a question from the serving index
    ///
    /// `top_k` falls back to `retrieval.top_k_results`. Fails with
    /// [`Error::NotReady`] only while no index has ever been published.
    pub async fn answer(&self, question: &str, top_k: Option<usize>) -> Result<Answer> {
        {
            let lifecycle = self.lifecycle.read();
            if !lifecycle.published {
                return Err(Error::NotReady(format!("pipeline is {}", lifecycle.state)));
            }
        }

        let k = top_k.unwrap_or(self.retrieval.top_k_results);
        let results = self.retriever.retrieve(question, k).await;
        if results.is_empty() {
            tracing::info!("No context retrieved for question");
            return Ok(Answer::no_context());
        }

        let chunks: Vec<Chunk> = results.into_iter().map(|r| r.chunk).collect();
        let text = self.generator.generate(question, &chunks).await;
        let sources = chunks
            .iter()
            .map(|c| Source::from_chunk(c, self.retrieval.snippet_chars))
            .collect();

        Ok(Answer::new(text, sources))
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.lifecycle.read().state
    }

    /// Whether an index has been published and queries are answered
    pub fn is_serving(&self) -> bool {
        self.lifecycle.read().published
    }

    /// Chunks in the serving index
    pub fn index_size(&self) -> usize {
        self.index.load().len()
    }

    /// Distinct documents in the serving index
    pub fn indexed_documents(&self) -> usize {
        self.index.load().document_count()
    }

    /// Health snapshot
    pub fn status(&self) -> PipelineStatus {
        let index = self.index.load();
        let lifecycle = self.lifecycle.read();
        let backend = self.generator.backend();

        PipelineStatus {
            status: lifecycle.state,
            indexed_documents: index.document_count(),
            indexed_chunks: index.len(),
            embedding_provider: self.embedder.name().to_string(),
            generation_backend: backend.name().to_string(),
            generation_model: backend.model().to_string(),
            last_error: lifecycle.last_error.clone(),
            last_report: lifecycle.last_report.clone(),
        }
    }
}
