//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::retry::{retry, BackoffPolicy};

use super::http::{build_client, parse_body, resolve_base_url, send_for_body};
use super::llm::GenerationBackend;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// `POST {base_url}/v1/chat/completions` with bearer authentication
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    backoff: BackoffPolicy,
}

impl OpenAiBackend {
    /// Default OpenAI endpoint
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    /// Default chat model
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Create a new OpenAI-compatible backend
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key("OPENAI_API_KEY")
            .ok_or_else(|| Error::Config("OpenAI backend needs api_key or OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            client: build_client(config.timeout())?,
            base_url: resolve_base_url(config.base_url.as_deref(), Self::DEFAULT_BASE_URL),
            model: config.model.clone().unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            backoff: config.backoff(),
        })
    }

    fn parse(body: &str) -> Result<String> {
        let response: ChatResponse = parse_body(body, "openai")?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::generation("openai returned no completion text"))
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        tracing::info!("Generating answer with model: {}", self.model);

        let url = url.as_str();
        retry(&self.backoff, "openai generation", move |_| async move {
            let request = self
                .client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(&ChatRequest {
                    model: &self.model,
                    messages: [ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                    temperature: self.temperature,
                    max_tokens: self.max_output_tokens,
                });

            let body = send_for_body(request, "openai").await?;
            Self::parse(&body)
        })
        .await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Step 1: ..."}}]}"#;
        assert_eq!(OpenAiBackend::parse(body).unwrap(), "Step 1: ...");
    }

    #[test]
    fn test_missing_content_is_generation_error() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(OpenAiBackend::parse(body), Err(Error::Generation(_))));
        assert!(matches!(OpenAiBackend::parse(r#"{"choices":[]}"#), Err(Error::Generation(_))));
    }

    #[test]
    fn test_explicit_key_is_used() {
        let config = BackendConfig {
            api_key: Some("sk-test".to_string()),
            model: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        let backend = OpenAiBackend::new(&config).unwrap();
        assert_eq!(backend.api_key, "sk-test");
        assert_eq!(backend.model(), "gpt-4o");
    }
}
