//! Factory for creating LLM providers from configuration

use crate::config::{LLMProviderConfig, LLMProviderType};
use crate::error::Result;
use crate::llm::LLMProvider;
use std::sync::Arc;

#[cfg(feature = "llm-gemini")]
use crate::llm::providers::gemini::GeminiProvider;

#[cfg(feature = "llm-openai")]
use crate::llm::providers::openai::OpenAIProvider;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - LLM provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created (e.g., missing API key)
    pub fn create(config: &LLMProviderConfig) -> Result<Arc<dyn LLMProvider>> {
        let model = if !config.model.is_empty() {
            Some(config.model.clone())
        } else {
            None
        };
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());

        match config.provider {
            #[cfg(feature = "llm-gemini")]
            LLMProviderType::Gemini => {
                let provider = match api_key {
                    Some(api_key) => {
                        let model = model
                            .unwrap_or_else(|| LLMProviderType::Gemini.default_model().to_string());
                        match &config.base_url {
                            Some(base_url) => {
                                GeminiProvider::with_base_url(api_key, model, base_url.clone())
                            }
                            None => GeminiProvider::new(api_key, model),
                        }
                    }
                    None => GeminiProvider::from_env(model)?,
                };

                tracing::debug!(model = provider.model(), "Using Gemini provider");
                Ok(Arc::new(provider))
            }

            #[cfg(not(feature = "llm-gemini"))]
            LLMProviderType::Gemini => Err(crate::error::ParleyError::Configuration(
                "Gemini provider requires 'llm-gemini' feature".to_string(),
            )),

            #[cfg(feature = "llm-openai")]
            LLMProviderType::OpenAI => {
                let provider = match api_key {
                    Some(api_key) => {
                        let model = model
                            .unwrap_or_else(|| LLMProviderType::OpenAI.default_model().to_string());
                        match &config.base_url {
                            Some(base_url) => {
                                OpenAIProvider::with_base_url(api_key, model, base_url.clone())
                            }
                            None => OpenAIProvider::new(api_key, model),
                        }
                    }
                    None => OpenAIProvider::from_env(model)?,
                };

                tracing::debug!(model = provider.model(), "Using OpenAI provider");
                Ok(Arc::new(provider))
            }

            #[cfg(not(feature = "llm-openai"))]
            LLMProviderType::OpenAI => Err(crate::error::ParleyError::Configuration(
                "OpenAI provider requires 'llm-openai' feature".to_string(),
            )),
        }
    }
}
