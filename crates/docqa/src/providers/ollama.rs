//! Ollama generation backend with retry logic

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::retry::{retry, BackoffPolicy};

use super::http::{build_client, parse_body, resolve_base_url, send_for_body};
use super::llm::GenerationBackend;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// `POST {base_url}/api/generate` on an Ollama server
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    backoff: BackoffPolicy,
}

impl OllamaBackend {
    /// Default Ollama endpoint
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    /// Default generation model
    pub const DEFAULT_MODEL: &'static str = "llama3.2";

    /// Create a new Ollama backend
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            base_url: resolve_base_url(config.base_url.as_deref(), Self::DEFAULT_BASE_URL),
            model: config.model.clone().unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            backoff: config.backoff(),
        })
    }

    fn parse(body: &str) -> Result<String> {
        let response: GenerateResponse = parse_body(body, "ollama")?;
        if response.response.trim().is_empty() {
            return Err(Error::generation("ollama returned an empty response"));
        }
        Ok(response.response)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        tracing::info!("Generating answer with model: {}", self.model);

        let url = url.as_str();
        retry(&self.backoff, "ollama generation", move |_| async move {
            let request = self.client.post(url).json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                    num_predict: self.max_output_tokens,
                },
            });

            let body = send_for_body(request, "ollama").await?;
            Self::parse(&body)
        })
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{"model":"llama3.2","response":"Twenty days.","done":true}"#;
        assert_eq!(OllamaBackend::parse(body).unwrap(), "Twenty days.");
    }

    #[test]
    fn test_blank_response_is_generation_error() {
        let err = OllamaBackend::parse(r#"{"response":"  "}"#).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn test_defaults() {
        let backend = OllamaBackend::new(&BackendConfig::default()).unwrap();
        assert_eq!(backend.model(), OllamaBackend::DEFAULT_MODEL);
        assert_eq!(backend.base_url, OllamaBackend::DEFAULT_BASE_URL);
    }
}
