//! Provider abstractions for embeddings and answer generation
//!
//! Embedding services come in two strategies: a local batch model (ONNX) and
//! per-text HTTP services driven through [`ConcurrentEmbedder`]. Generation
//! backends share the [`GenerationBackend`] trait.

pub mod concurrent;
pub mod embedding;
pub mod gemini;
mod http;
pub mod http_embed;
pub mod llm;
pub mod ollama;
pub mod onnx;
pub mod openai;

pub use concurrent::{ConcurrentEmbedder, EmbeddingTransport};
pub use embedding::EmbeddingProvider;
pub use gemini::GeminiBackend;
pub use http::build_client;
pub use http_embed::{OllamaTransport, OpenAiTransport};
pub use llm::GenerationBackend;
pub use ollama::OllamaBackend;
pub use onnx::OnnxEmbedder;
pub use openai::OpenAiBackend;

use std::sync::Arc;

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::error::{Error, Result};

/// Build the embedding provider described by the configuration
///
/// The ONNX variant loads (and on first use downloads) the model, hence async.
pub async fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config {
        EmbeddingConfig::Onnx(onnx) => Arc::new(OnnxEmbedder::new(onnx).await?),
        EmbeddingConfig::Ollama(remote) => {
            let transport = OllamaTransport::new(
                build_client(remote.timeout())?,
                remote.base_url.as_deref(),
                remote.model.as_deref(),
            );
            Arc::new(
                ConcurrentEmbedder::new(transport, remote.max_concurrency, remote.timeout(), remote.backoff())
                    .with_dimensions(remote.dimensions),
            )
        }
        EmbeddingConfig::OpenAi(remote) => {
            let api_key = remote
                .resolved_api_key("OPENAI_API_KEY")
                .ok_or_else(|| Error::Config("OpenAI embeddings need api_key or OPENAI_API_KEY".to_string()))?;
            let transport = OpenAiTransport::new(
                build_client(remote.timeout())?,
                remote.base_url.as_deref(),
                remote.model.as_deref(),
                api_key,
            );
            Arc::new(
                ConcurrentEmbedder::new(transport, remote.max_concurrency, remote.timeout(), remote.backoff())
                    .with_dimensions(remote.dimensions),
            )
        }
    };

    tracing::info!("Embedding provider: {}", provider.name());
    Ok(provider)
}

/// Build the generation backend described by the configuration
pub fn backend_from_config(config: &GenerationConfig) -> Result<Arc<dyn GenerationBackend>> {
    let backend: Arc<dyn GenerationBackend> = match config {
        GenerationConfig::Ollama(c) => Arc::new(OllamaBackend::new(c)?),
        GenerationConfig::OpenAi(c) => Arc::new(OpenAiBackend::new(c)?),
        GenerationConfig::Gemini(c) => Arc::new(GeminiBackend::new(c)?),
    };

    tracing::info!("Generation backend: {} ({})", backend.name(), backend.model());
    Ok(backend)
}
