//! Streaming relay
//!
//! Forwards upstream fragments to an [`OutputSink`] as they arrive while
//! accumulating the full reply. The reply is handed to a commit callback
//! only when the upstream stream ends cleanly; a failure or a vanished
//! client leaves committed state untouched.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::error::{ParleyError, Result};
use crate::llm::{ChunkStream, LLMProvider, LLMRequest, ModelInfo};

pub mod sink;
pub mod wire;

pub use sink::ChannelSink;
pub use wire::WireFormat;

/// Destination of relay signals.
///
/// An `Err` from any method means the client is gone.
#[async_trait]
pub trait OutputSink: Send {
    /// Forward one fragment.
    async fn chunk(&mut self, fragment: &str) -> Result<()>;

    /// Report a failure with a message fit for end users.
    async fn error(&mut self, message: &str) -> Result<()>;

    /// Mark the end of the reply.
    async fn end(&mut self) -> Result<()>;
}

/// How a relay finished
#[derive(Debug)]
pub enum RelayOutcome {
    /// Stream exhausted and the reply committed
    Completed { text: String },

    /// Upstream or commit failure; error and end signals were sent
    Failed { error: ParleyError },

    /// The sink stopped accepting frames
    Disconnected,
}

impl RelayOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RelayOutcome::Completed { .. })
    }
}

/// Drain `upstream` into `sink`, committing the accumulated text on success.
///
/// On clean exhaustion `on_complete` runs exactly once, before the end
/// signal. On an upstream error the sink gets an error signal followed by
/// the end signal and `on_complete` never runs.
pub async fn relay<S, F, Fut>(
    mut upstream: ChunkStream,
    sink: &mut S,
    on_complete: F,
) -> RelayOutcome
where
    S: OutputSink + ?Sized,
    F: FnOnce(String) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
{
    let mut text = String::new();

    while let Some(item) = upstream.next().await {
        match item {
            Ok(fragment) => {
                if sink.chunk(&fragment).await.is_err() {
                    debug!(received = text.len(), "Client went away mid-stream");
                    return RelayOutcome::Disconnected;
                }
                text.push_str(&fragment);
            }
            Err(error) => {
                warn!(error = %error, received = text.len(), "Upstream stream failed");
                return fail(sink, error).await;
            }
        }
    }

    if let Err(error) = on_complete(text.clone()).await {
        warn!(error = %error, "Failed to commit reply");
        return fail(sink, error).await;
    }

    if sink.end().await.is_err() {
        debug!("Client went away before the end signal");
    }

    RelayOutcome::Completed { text }
}

async fn fail<S>(sink: &mut S, error: ParleyError) -> RelayOutcome
where
    S: OutputSink + ?Sized,
{
    if sink.error(&error.public_message()).await.is_err() || sink.end().await.is_err() {
        debug!("Client went away while reporting a failure");
    }
    RelayOutcome::Failed { error }
}

/// Relay bound to an upstream provider.
///
/// Covers the failure that happens before any stream exists (connection,
/// authentication, quota) on top of what [`relay`] handles.
#[derive(Clone)]
pub struct StreamingRelay {
    provider: Arc<dyn LLMProvider>,
}

impl StreamingRelay {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn model_info(&self) -> ModelInfo {
        self.provider.model_info()
    }

    /// Open an upstream stream for `prompt` and relay it into `sink`.
    pub async fn run<S, F, Fut>(&self, prompt: String, sink: &mut S, on_complete: F) -> RelayOutcome
    where
        S: OutputSink + ?Sized,
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let request = LLMRequest::from_prompt(prompt);
        match self.provider.generate_stream(&request).await {
            Ok(stream) => relay(stream, sink, on_complete).await,
            Err(error) => {
                warn!(error = %error, "Upstream refused to open a stream");
                fail(sink, error).await
            }
        }
    }
}
