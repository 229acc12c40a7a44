//! # Parley - Streaming conversation relay
//!
//! Parley keeps a short per-client conversation history, flattens it into a
//! single prompt for an upstream generation API and relays the reply back
//! fragment by fragment as it is generated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ParleyConfig::load()?;
//!     let relay = StreamingRelay::new(LLMProviderFactory::create(&config.llm)?);
//!
//!     let mut history = ConversationHistory::new();
//!     let builder = ContextBuilder::new().with_window(config.prompt.max_turns);
//!     let (message, prompt) = builder.build(history.turns(), "Olá!")?;
//!     history.push_user(message);
//!
//!     let (mut sink, mut frames) = ChannelSink::channel(WireFormat::PlainText, 16);
//!     tokio::spawn(async move {
//!         while let Some(frame) = frames.recv().await {
//!             print!("{frame}");
//!         }
//!     });
//!
//!     relay.run(prompt, &mut sink, |_reply| async { Ok(()) }).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **conversation**: turns, prompt assembly and session storage
//! - **llm**: the upstream provider seam and its implementations
//! - **relay**: chunk forwarding, commit-on-success and wire framing
//! - **config**: layered configuration loaded with figment
//!
//! ## Feature Flags
//!
//! - `llm-gemini`: Gemini `generateContent` provider (default)
//! - `llm-openai`: OpenAI-compatible `chat/completions` provider (default)
//! - `test-util`: `ScriptedProvider`, a canned-reply provider for tests

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod relay;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LLMProviderConfig, LLMProviderType, ParleyConfig};
    pub use crate::conversation::{
        ContextBuilder, ConversationHistory, InMemorySessionStore, Role, SessionId, SessionStore,
        Turn, build_prompt, validate_message,
    };
    pub use crate::error::{ParleyError, Result};
    pub use crate::llm::{
        ChunkStream, LLMProvider, LLMProviderFactory, LLMRequest, LLMResponse, ModelInfo,
    };
    pub use crate::relay::{
        ChannelSink, OutputSink, RelayOutcome, StreamingRelay, WireFormat, relay,
    };
}
