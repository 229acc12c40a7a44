//! OpenAI-compatible LLM provider implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::config::LLMProviderType;
use crate::error::{ParleyError, Result};
use crate::llm::sse::data_payloads;
use crate::llm::{ChunkStream, LLMProvider, LLMRequest, LLMResponse, ModelInfo, TokenUsage};

/// Default OpenAI model
pub const DEFAULT_OPENAI_MODEL: &str = LLMProviderType::OpenAI.default_model();

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider; also works with any `/chat/completions` compatible API.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create with a custom base URL (for Azure OpenAI or compatible APIs).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    ///
    /// Reads from:
    /// - `OPENAI_API_KEY` - API key (required)
    /// - `OPENAI_MODEL` - Model name (optional, defaults to "gpt-4o-mini")
    /// - `OPENAI_BASE_URL` - Custom base URL (optional)
    pub fn from_env(model: Option<impl Into<String>>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ParleyError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::with_base_url(api_key, model, base_url))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body(&self, request: &LLMRequest, stream: bool) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn post(&self, body: &OpenAIRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ParleyError::upstream(format!("Failed to send request to OpenAI: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            // Try to parse as OpenAI error format
            let message = match serde_json::from_str::<OpenAIError>(&text) {
                Ok(error) => format!(
                    "OpenAI API error ({}): {}",
                    error.error.error_type.unwrap_or_else(|| status.to_string()),
                    error.error.message
                ),
                Err(_) => format!("OpenAI API error ({}): {}", status, text),
            };

            return Err(ParleyError::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        Ok(response)
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIContent>,
    delta: Option<OpenAIContent>,
}

#[derive(Deserialize)]
struct OpenAIContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn decode_stream_event(data: &str) -> Option<Result<String>> {
    if data == "[DONE]" {
        return None;
    }

    if let Ok(error) = serde_json::from_str::<OpenAIError>(data) {
        return Some(Err(ParleyError::upstream(format!(
            "OpenAI stream error: {}",
            error.error.message
        ))));
    }

    match serde_json::from_str::<OpenAIResponse>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .map(Ok),
        Err(e) => Some(Err(ParleyError::upstream(format!(
            "Failed to parse stream chunk: {}",
            e
        )))),
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let response = self.post(&self.body(request, false)).await?;

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            ParleyError::upstream(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let usage = openai_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ParleyError::upstream("OpenAI API returned no choices"))?
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        Ok(LLMResponse { content, usage })
    }

    async fn generate_stream(&self, request: &LLMRequest) -> Result<ChunkStream> {
        let response = self.post(&self.body(request, true)).await?;

        let stream = data_payloads(response).filter_map(|payload| match payload {
            Ok(data) => decode_stream_event(&data),
            Err(e) => Some(Err(e)),
        });

        Ok(Box::pin(stream))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai".to_string(),
            model_name: self.model.clone(),
        }
    }
}
