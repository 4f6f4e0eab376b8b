//! Configuration for the question-answering pipeline
//!
//! Loaded from TOML. Every section has defaults, so an empty file is a valid
//! (local Ollama) configuration. Provider families are tagged enums selected by
//! their `type` key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::BackoffPolicy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// HTTP front door
    pub server: ServerConfig,
    /// Passage chunking
    pub chunking: ChunkingConfig,
    /// Query-time retrieval
    pub retrieval: RetrievalConfig,
    /// Embedding provider
    pub embeddings: EmbeddingConfig,
    /// Generation backend
    pub generation: GenerationConfig,
    /// Document source
    pub source: SourceConfig,
}

impl RagConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML configuration string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting eagerly; any error here is fatal at startup
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.embeddings.validate()?;
        self.generation.validate()?;
        self.source.validate()?;
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window width in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Maximum chunks per document; longer documents are truncated
    pub max_chunks: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_chunks: 100,
        }
    }
}

impl ChunkingConfig {
    /// Validate chunking parameters
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_chunks == 0 {
            return Err(Error::Config("chunking.max_chunks must be positive".to_string()));
        }
        Ok(())
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of chunks per question
    pub top_k_results: usize,
    /// Characters of chunk text included in each source entry
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_results: 4,
            snippet_chars: 200,
        }
    }
}

impl RetrievalConfig {
    /// Validate retrieval parameters
    pub fn validate(&self) -> Result<()> {
        if self.top_k_results == 0 {
            return Err(Error::Config("retrieval.top_k_results must be positive".to_string()));
        }
        if self.snippet_chars == 0 {
            return Err(Error::Config("retrieval.snippet_chars must be positive".to_string()));
        }
        Ok(())
    }
}

/// Embedding provider selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    /// Local ONNX sentence-transformer (batch strategy)
    Onnx(OnnxEmbeddingConfig),
    /// Ollama `/api/embeddings` (concurrent strategy)
    Ollama(RemoteEmbeddingConfig),
    /// OpenAI-compatible `/v1/embeddings` (concurrent strategy)
    #[serde(rename = "openai")]
    OpenAi(RemoteEmbeddingConfig),
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Ollama(RemoteEmbeddingConfig::default())
    }
}

impl EmbeddingConfig {
    /// Validate the selected provider's settings
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Onnx(config) => config.validate(),
            Self::Ollama(config) => config.validate("ollama"),
            Self::OpenAi(config) => {
                config.validate("openai")?;
                if config.resolved_api_key("OPENAI_API_KEY").is_none() {
                    return Err(Error::Config(
                        "embeddings type 'openai' needs api_key or OPENAI_API_KEY".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Settings for the local ONNX embedder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxEmbeddingConfig {
    /// sentence-transformers model name on the Hugging Face hub
    pub model: String,
    /// Output dimensions
    pub dimensions: usize,
    /// Texts per inference call
    pub batch_size: usize,
    /// Maximum sequence length in tokens
    pub max_length: usize,
    /// Directory holding `model.onnx` and `tokenizer.json`
    pub cache_dir: PathBuf,
    /// Intra-op threads (defaults to the CPU count, max 8)
    pub intra_threads: Option<usize>,
}

impl Default for OnnxEmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            batch_size: 32,
            max_length: 256,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("docqa")
                .join("models"),
            intra_threads: None,
        }
    }
}

impl OnnxEmbeddingConfig {
    /// Validate ONNX settings
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Config("embeddings.model must not be empty".to_string()));
        }
        if self.dimensions == 0 || self.batch_size == 0 || self.max_length == 0 {
            return Err(Error::Config(
                "embeddings.dimensions, batch_size and max_length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings shared by HTTP embedding services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEmbeddingConfig {
    /// Service base URL (provider default when unset)
    pub base_url: Option<String>,
    /// Model name (provider default when unset)
    pub model: Option<String>,
    /// API key (OpenAI only; falls back to `OPENAI_API_KEY`)
    pub api_key: Option<String>,
    /// Expected vector dimensions, if known
    pub dimensions: Option<usize>,
    /// Maximum simultaneous in-flight requests
    pub max_concurrency: usize,
    /// Retries per text after the first attempt
    pub max_retries: u32,
    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds
    pub max_backoff_ms: u64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: None,
            dimensions: None,
            max_concurrency: 8,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            timeout_secs: 30,
        }
    }
}

impl RemoteEmbeddingConfig {
    /// Validate remote embedding settings
    pub fn validate(&self, provider: &str) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config(format!(
                "embeddings.max_concurrency must be positive for '{}'",
                provider
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("embeddings.timeout_secs must be positive".to_string()));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(Error::Config(
                "embeddings.max_backoff_ms must be >= initial_backoff_ms".to_string(),
            ));
        }
        if let Some(url) = &self.base_url {
            validate_url("embeddings.base_url", url)?;
        }
        Ok(())
    }

    /// Retry schedule for one embedding request
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured API key, else the named environment variable
    pub fn resolved_api_key(&self, env_var: &str) -> Option<String> {
        resolve_key(self.api_key.as_deref(), env_var)
    }
}

/// Generation backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerationConfig {
    /// Local Ollama server
    Ollama(BackendConfig),
    /// OpenAI-compatible chat completions API
    #[serde(rename = "openai")]
    OpenAi(BackendConfig),
    /// Google Gemini API
    Gemini(BackendConfig),
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::Ollama(BackendConfig::default())
    }
}

impl GenerationConfig {
    /// Settings of the selected backend
    pub fn backend(&self) -> &BackendConfig {
        match self {
            Self::Ollama(c) | Self::OpenAi(c) | Self::Gemini(c) => c,
        }
    }

    /// Validate the selected backend's settings
    pub fn validate(&self) -> Result<()> {
        self.backend().validate()?;
        let missing_key = match self {
            Self::Ollama(_) => None,
            Self::OpenAi(c) => c.resolved_api_key("OPENAI_API_KEY").is_none().then_some("OPENAI_API_KEY"),
            Self::Gemini(c) => c.resolved_api_key("GEMINI_API_KEY").is_none().then_some("GEMINI_API_KEY"),
        };
        if let Some(env_var) = missing_key {
            return Err(Error::Config(format!(
                "generation backend needs api_key or {}",
                env_var
            )));
        }
        Ok(())
    }
}

/// Settings shared by generation backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Model identifier (backend default when unset)
    pub model: Option<String>,
    /// Base URL (backend default when unset)
    pub base_url: Option<String>,
    /// API key (falls back to the backend's environment variable)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token limit
    pub max_output_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: 120,
            max_retries: 2,
            temperature: 0.3,
            max_output_tokens: 1024,
        }
    }
}

impl BackendConfig {
    /// Validate backend settings
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("generation.timeout_secs must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if let Some(url) = &self.base_url {
            validate_url("generation.base_url", url)?;
        }
        Ok(())
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry schedule for generation requests
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.max_retries, Duration::from_secs(1), Duration::from_secs(8))
    }

    /// Configured API key, else the named environment variable
    pub fn resolved_api_key(&self, env_var: &str) -> Option<String> {
        resolve_key(self.api_key.as_deref(), env_var)
    }
}

/// Document source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Rows from a SQLite table
    Sqlite {
        /// Database file
        path: PathBuf,
        /// Query returning `(id, file_name, raw_text)` rows
        #[serde(default = "default_sqlite_query")]
        query: String,
    },
    /// Files under a directory
    Directory {
        /// Root directory
        path: PathBuf,
        /// Descend into subdirectories
        #[serde(default = "default_recursive")]
        recursive: bool,
    },
}

fn default_sqlite_query() -> String {
    "SELECT id, file_name, raw_text FROM documents ORDER BY id".to_string()
}

fn default_recursive() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Directory {
            path: PathBuf::from("documents"),
            recursive: true,
        }
    }
}

impl SourceConfig {
    /// Validate source settings
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Sqlite { query, .. } if query.trim().is_empty() => {
                Err(Error::Config("source.query must not be empty".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Check that the configured corpus exists on disk
    ///
    /// Run by `Pipeline::from_config`; [`SourceConfig::validate`] does not touch
    /// the filesystem.
    pub fn check_paths(&self) -> Result<()> {
        match self {
            Self::Sqlite { path, .. } if !path.is_file() => Err(Error::Config(format!(
                "source.path '{}' is not an existing database file",
                path.display()
            ))),
            Self::Directory { path, .. } if !path.is_dir() => Err(Error::Config(format!(
                "source.path '{}' is not an existing directory",
                path.display()
            ))),
            _ => Ok(()),
        }
    }
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    reqwest::Url::parse(url)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("{} '{}' is not a valid URL: {}", field, url, e)))
}

fn resolve_key(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
}
