//! HTTP embedding transports (Ollama and OpenAI-compatible services)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::concurrent::{non_empty, EmbeddingTransport};
use super::http::{parse_body, resolve_base_url, send_for_body};

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

/// `POST {base_url}/api/embeddings` on an Ollama server
pub struct OllamaTransport {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaTransport {
    /// Default Ollama endpoint
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    /// Default embedding model
    pub const DEFAULT_MODEL: &'static str = "nomic-embed-text";

    /// Create a new Ollama transport
    pub fn new(client: Client, base_url: Option<&str>, model: Option<&str>) -> Self {
        Self {
            client,
            base_url: resolve_base_url(base_url, Self::DEFAULT_BASE_URL),
            model: model.unwrap_or(Self::DEFAULT_MODEL).to_string(),
        }
    }

    fn parse(body: &str) -> Result<Vec<f32>> {
        let response: OllamaEmbedResponse = parse_body(body, "ollama")?;
        non_empty(response.embedding, "ollama")
    }
}

#[async_trait]
impl EmbeddingTransport for OllamaTransport {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = self.client.post(&url).json(&OllamaEmbedRequest {
            model: &self.model,
            prompt: text,
        });

        let body = send_for_body(request, "ollama").await?;
        Self::parse(&body)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

/// `POST {base_url}/v1/embeddings` with bearer authentication
pub struct OpenAiTransport {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiTransport {
    /// Default OpenAI endpoint
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    /// Default embedding model
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

    /// Create a new OpenAI-compatible transport
    pub fn new(client: Client, base_url: Option<&str>, model: Option<&str>, api_key: String) -> Self {
        Self {
            client,
            base_url: resolve_base_url(base_url, Self::DEFAULT_BASE_URL),
            model: model.unwrap_or(Self::DEFAULT_MODEL).to_string(),
            api_key,
        }
    }

    fn parse(body: &str) -> Result<Vec<f32>> {
        let response: OpenAiEmbedResponse = parse_body(body, "openai")?;
        let first = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed("openai response has no data entries"))?;
        non_empty(first.embedding, "openai")
    }
}

#[async_trait]
impl EmbeddingTransport for OpenAiTransport {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&OpenAiEmbedRequest {
                model: &self.model,
                input: text,
            });

        let body = send_for_body(request, "openai").await?;
        Self::parse(&body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama_embedding() {
        let vector = OllamaTransport::parse(r#"{"embedding":[0.5,-1.0,2.0]}"#).unwrap();
        assert_eq!(vector, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_ollama_missing_or_empty_vector_is_malformed() {
        assert!(matches!(
            OllamaTransport::parse(r#"{"error":"model not loaded"}"#),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            OllamaTransport::parse(r#"{"embedding":[]}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_openai_embedding() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[1.0,2.0]}],"model":"m"}"#;
        assert_eq!(OpenAiTransport::parse(body).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_openai_empty_data_is_malformed() {
        assert!(matches!(
            OpenAiTransport::parse(r#"{"data":[]}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_base_url_defaults_and_trailing_slash() {
        let transport = OllamaTransport::new(Client::new(), Some("http://gpu-box:11434/"), None);
        assert_eq!(transport.base_url, "http://gpu-box:11434");
        assert_eq!(transport.model, OllamaTransport::DEFAULT_MODEL);

        let transport = OpenAiTransport::new(Client::new(), None, Some("e5"), "k".to_string());
        assert_eq!(transport.base_url, OpenAiTransport::DEFAULT_BASE_URL);
        assert_eq!(transport.model, "e5");
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let transport = OllamaTransport::new(Client::new(), Some("http://127.0.0.1:1"), None);
        let err = transport.embed("hello").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
