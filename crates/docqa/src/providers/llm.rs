//! Generation backend trait for producing answers from a prompt

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM-based text generation
///
/// Implementations:
/// - `OllamaBackend`: local Ollama server (llama3, phi3, etc.)
/// - `OpenAiBackend`: OpenAI-compatible chat completions
/// - `GeminiBackend`: Google Gemini `generateContent`
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for a fully built prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get backend name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
