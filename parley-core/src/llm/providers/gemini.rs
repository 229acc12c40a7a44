//! Google Gemini LLM provider implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::config::LLMProviderType;
use crate::error::{ParleyError, Result};
use crate::llm::sse::data_payloads;
use crate::llm::{ChunkStream, LLMProvider, LLMRequest, LLMResponse, ModelInfo, TokenUsage};

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = LLMProviderType::Gemini.default_model();

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider (generateContent / streamGenerateContent).
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Gemini API key
    /// * `model` - Model name (e.g., "gemini-2.5-flash")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create with a custom base URL (for proxies or tests).
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
    /// - `GEMINI_API_KEY` - API key (required)
    /// - `GEMINI_MODEL` - Model name (optional, defaults to "gemini-2.5-flash")
    ///
    /// # Errors
    ///
    /// Returns an error if GEMINI_API_KEY is not set.
    pub fn from_env(model: Option<impl Into<String>>) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            ParleyError::Configuration("GEMINI_API_KEY environment variable not set".to_string())
        })?;

        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("GEMINI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        Ok(Self::new(api_key, model))
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post(&self, url: &str, request: &LLMRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GeminiRequest::from(request))
            .send()
            .await
            .map_err(|e| {
                ParleyError::upstream(format!("Failed to send request to Gemini: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(api_error(Some(status.as_u16()), &text));
        }

        Ok(response)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

impl From<&LLMRequest> for GeminiRequest {
    fn from(request: &LLMRequest) -> Self {
        let generation_config = (request.temperature.is_some() || request.max_tokens.is_some())
            .then(|| GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            });

        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    code: Option<u16>,
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiResponse {
    /// Text of the first candidate, if it carries any text parts.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut texts = content.parts.iter().filter_map(|p| p.text.as_deref()).peekable();
        texts.peek()?;
        Some(texts.collect())
    }

    fn into_error(self) -> Option<ParleyError> {
        if let Some(detail) = self.error {
            return Some(detail.into_error(None));
        }
        let reason = self.prompt_feedback.and_then(|f| f.block_reason)?;
        Some(ParleyError::upstream(format!("Gemini blocked the prompt: {}", reason)))
    }
}

impl GeminiErrorDetail {
    fn into_error(self, http_status: Option<u16>) -> ParleyError {
        ParleyError::Upstream {
            status: http_status.or(self.code),
            message: format!(
                "Gemini API error ({}): {}",
                self.status.as_deref().unwrap_or("UNKNOWN"),
                self.message
            ),
        }
    }
}

fn api_error(status: Option<u16>, body: &str) -> ParleyError {
    // Try to parse as Gemini error format
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) => error.error.into_error(status),
        Err(_) => ParleyError::Upstream {
            status,
            message: format!("Gemini API error: {}", body),
        },
    }
}

/// Decode one streamed event into a fragment, an error, or nothing.
fn decode_stream_event(data: &str) -> Option<Result<String>> {
    let event: GeminiResponse = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            return Some(Err(ParleyError::upstream(format!(
                "Failed to parse stream chunk: {}",
                e
            ))));
        }
    };

    match event.text() {
        Some(text) => Some(Ok(text)),
        None => event.into_error().map(Err),
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let response = self.post(&self.endpoint("generateContent"), request).await?;

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            ParleyError::upstream(format!("Failed to parse Gemini response: {}", e))
        })?;

        let usage = gemini_response.usage_metadata.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        match gemini_response.text() {
            Some(content) => Ok(LLMResponse { content, usage }),
            None => Err(gemini_response
                .into_error()
                .unwrap_or_else(|| ParleyError::upstream("Gemini API returned no text"))),
        }
    }

    async fn generate_stream(&self, request: &LLMRequest) -> Result<ChunkStream> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, request).await?;

        let stream = data_payloads(response).filter_map(|payload| match payload {
            Ok(data) => decode_stream_event(&data),
            Err(e) => Some(Err(e)),
        });

        Ok(Box::pin(stream))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "gemini".to_string(),
            model_name: self.model.clone(),
        }
    }
}
