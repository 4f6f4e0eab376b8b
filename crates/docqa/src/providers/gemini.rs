//! Google Gemini generation backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::retry::{retry, BackoffPolicy};

use super::http::{build_client, parse_body, resolve_base_url, send_for_body};
use super::llm::GenerationBackend;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationParams,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// `POST {base_url}/v1beta/models/{model}:generateContent`
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    backoff: BackoffPolicy,
}

impl GeminiBackend {
    /// Default Gemini endpoint
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    /// Default model
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";
    /// Header carrying the API key
    const API_KEY_HEADER: &'static str = "x-goog-api-key";

    /// Create a new Gemini backend
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key("GEMINI_API_KEY")
            .ok_or_else(|| Error::Config("Gemini backend needs api_key or GEMINI_API_KEY".to_string()))?;

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

    /// Concatenate the text parts of the first candidate
    fn parse(body: &str) -> Result<String> {
        let response: GenerateContentResponse = parse_body(body, "gemini")?;
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::generation("gemini returned no candidate text"));
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        tracing::info!("Generating answer with model: {}", self.model);

        let url = url.as_str();
        retry(&self.backoff, "gemini generation", move |_| async move {
            let request = self
                .client
                .post(url)
                .header(Self::API_KEY_HEADER, self.api_key.as_str())
                .json(&GenerateContentRequest {
                    contents: [Content {
                        role: "user",
                        parts: [Part { text: prompt }],
                    }],
                    generation_config: GenerationParams {
                        temperature: self.temperature,
                        max_output_tokens: self.max_output_tokens,
                    },
                });

            let body = send_for_body(request, "gemini").await?;
            Self::parse(&body)
        })
        .await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"world"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(GeminiBackend::parse(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_blocked_prompt_is_generation_error() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(GeminiBackend::parse(body), Err(Error::Generation(_))));
    }

    #[test]
    fn test_request_uses_camel_case() {
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: "q" }],
            }],
            generation_config: GenerationParams {
                temperature: 0.2,
                max_output_tokens: 64,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 64);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "q");
    }

    #[tokio::test]
    async fn test_api_key_stays_out_of_errors() {
        let backend = GeminiBackend::new(&BackendConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            api_key: Some("gemini-secret-123".to_string()),
            max_retries: 0,
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap();

        let err = backend.generate("hello").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.to_string().contains("gemini-secret-123"));
    }
}
