//! HTTP front end for Parley
//!
//! Routes:
//! - `POST /enviar` - one-shot reply as JSON
//! - `POST /stream` - reply streamed as plain text or server-sent events
//! - `POST /reset` - forget the session's history
//! - `GET /health` - liveness and model name

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use parley_core::config::ParleyConfig;
use parley_core::conversation::{ContextBuilder, InMemorySessionStore, SessionStore};
use parley_core::llm::LLMProvider;
use parley_core::relay::StreamingRelay;

pub mod error;
pub mod routes;
pub mod session;
pub mod telemetry;

/// Shared application state, built once at startup
pub struct AppState {
    pub config: ParleyConfig,
    pub relay: StreamingRelay,
    pub store: Arc<dyn SessionStore>,
    pub builder: ContextBuilder,
}

impl AppState {
    /// Build state with an in-memory session store sized from `config`.
    pub fn new(config: ParleyConfig, provider: Arc<dyn LLMProvider>) -> Self {
        let store = Arc::new(InMemorySessionStore::new(config.session.ttl));
        Self::with_store(config, provider, store)
    }

    pub fn with_store(
        config: ParleyConfig,
        provider: Arc<dyn LLMProvider>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let builder = ContextBuilder::new()
            .with_window(config.prompt.max_turns)
            .with_system_instruction(config.prompt.system_instruction.clone());

        Self {
            config,
            relay: StreamingRelay::new(provider),
            store,
            builder,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/enviar", post(routes::send_message))
        .route("/stream", post(routes::stream_message))
        .route("/reset", post(routes::reset))
        .route("/health", get(routes::health))
        .with_state(state)
}
