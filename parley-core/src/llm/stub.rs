//! Scripted provider for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{ParleyError, Result};
use crate::llm::{ChunkStream, LLMProvider, LLMRequest, LLMResponse, ModelInfo};

/// One canned generation
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Stream these fragments, then finish normally
    Chunks(Vec<String>),

    /// Stream these fragments, then fail mid-generation
    FailAfter { chunks: Vec<String>, message: String },

    /// Fail before any fragment is produced
    Refuse(String),
}

impl ScriptedReply {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedReply::Chunks(chunks.into_iter().map(Into::into).collect())
    }

    pub fn fail_after<I, S>(chunks: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedReply::FailAfter {
            chunks: chunks.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    pub fn refuse(message: impl Into<String>) -> Self {
        ScriptedReply::Refuse(message.into())
    }
}

/// Provider that replays queued replies in order and records every prompt.
///
/// Once the queue is empty each call fails with a configuration error.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue another reply.
    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self, request: &LLMRequest) -> Result<ScriptedReply> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.prompt.clone());

        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| ParleyError::Configuration("No scripted reply left".to_string()))
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        match self.next_reply(request)? {
            ScriptedReply::Chunks(chunks) => Ok(LLMResponse {
                content: chunks.concat(),
                usage: None,
            }),
            ScriptedReply::FailAfter { message, .. } | ScriptedReply::Refuse(message) => {
                Err(ParleyError::upstream(message))
            }
        }
    }

    async fn generate_stream(&self, request: &LLMRequest) -> Result<ChunkStream> {
        let (chunks, failure) = match self.next_reply(request)? {
            ScriptedReply::Chunks(chunks) => (chunks, None),
            ScriptedReply::FailAfter { chunks, message } => (chunks, Some(message)),
            ScriptedReply::Refuse(message) => return Err(ParleyError::upstream(message)),
        };

        let items = chunks
            .into_iter()
            .map(Ok)
            .chain(failure.map(|message| Err(ParleyError::upstream(message))));

        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "scripted".to_string(),
        }
    }
}
