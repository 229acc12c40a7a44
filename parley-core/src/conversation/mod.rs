//! Conversation History and Context
//!
//! Role-tagged turn history, prompt assembly over a trailing window, and
//! the session store that keeps one history per client.
//!
//! # Example
//!
//! ```rust
//! use parley_core::conversation::{ConversationHistory, build_prompt};
//!
//! let mut history = ConversationHistory::new();
//! history.push_user("Oi");
//! history.push_assistant("Olá! Como posso ajudar?");
//!
//! let prompt = build_prompt(history.turns(), "Qual é a capital do Brasil?", 12);
//! assert!(prompt.ends_with("Usuário: Qual é a capital do Brasil?\nAssistente:"));
//! ```

mod history;
mod prompt;
mod store;

pub use history::{ConversationHistory, Role, Turn};
pub use prompt::{
    ContextBuilder, DEFAULT_MAX_TURNS, DEFAULT_SYSTEM_INSTRUCTION, EMPTY_MESSAGE, build_prompt,
    validate_message,
};
pub use store::{
    DEFAULT_SESSION_TTL, InMemorySessionStore, MAX_SESSION_TTL, SessionId, SessionStore,
};
