//! Upstream generation API
//!
//! [`LLMProvider`] is the seam between the relay and the model vendor. The
//! relay only needs a prompt in and either one reply or an ordered stream of
//! text fragments out.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::{ParleyError, Result};

/// Ordered, finite sequence of text fragments from a streaming generation.
///
/// An `Err` item ends the generation; items after it are never read.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Request to an LLM provider
#[derive(Debug, Clone)]
pub struct LLMRequest {
    /// Flattened prompt, sent as a single user content
    pub prompt: String,

    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    /// Create a simple request from a single prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Generated content
    pub content: String,

    /// Token usage information
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Trait for upstream generation APIs.
///
/// Implementations are built once at startup and shared across requests,
/// so they must be `Send + Sync` and hold no per-request state.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a complete reply in one response.
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse>;

    /// Generate with streaming response.
    ///
    /// Errors returned here happen before any fragment was produced
    /// (connection, authentication, quota). Errors inside the stream happen
    /// mid-generation.
    async fn generate_stream(&self, _request: &LLMRequest) -> Result<ChunkStream> {
        Err(ParleyError::Configuration(
            "Streaming not supported by this provider".to_string(),
        ))
    }

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

pub mod factory;
pub mod providers;
mod sse;
#[cfg(any(test, feature = "test-util"))]
pub mod stub;

pub use factory::LLMProviderFactory;
#[cfg(any(test, feature = "test-util"))]
pub use stub::{ScriptedProvider, ScriptedReply};
