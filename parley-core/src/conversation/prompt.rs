//! Prompt assembly from a trailing window of history

use crate::error::{ParleyError, Result};

use super::history::{Role, Turn};

/// Persona preamble placed before the rendered turns
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "Você é um assistente gentil e natural, com memória da conversa. \
     Continue o diálogo de forma fluida e coerente.";

/// Default number of prior turns rendered into the prompt
pub const DEFAULT_MAX_TURNS: usize = 12;

/// Message returned when the user sends only whitespace
pub const EMPTY_MESSAGE: &str = "Mensagem vazia";

/// Flatten the trailing `window` turns of `history` plus `new_user_text`
/// into a single prompt.
///
/// `history` holds the turns before the new message; the new user line is
/// rendered here and history is left untouched.
pub fn build_prompt(history: &[Turn], new_user_text: &str, window: usize) -> String {
    render(DEFAULT_SYSTEM_INSTRUCTION, history, new_user_text, window)
}

fn render(
    system_instruction: &str,
    history: &[Turn],
    new_user_text: &str,
    window: usize,
) -> String {
    let start = history.len().saturating_sub(window);

    let mut prompt = String::with_capacity(system_instruction.len() + 64);
    prompt.push_str(system_instruction);
    prompt.push('\n');

    for turn in &history[start..] {
        prompt.push_str(&turn.render());
    }

    prompt.push_str(Role::User.prefix());
    prompt.push(' ');
    prompt.push_str(new_user_text);
    prompt.push('\n');
    prompt.push_str(Role::Assistant.prefix());
    prompt
}

/// Trim and reject empty user input.
pub fn validate_message(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParleyError::Validation(EMPTY_MESSAGE.to_string()));
    }
    Ok(trimmed)
}

/// Prompt builder carrying the configured persona and window size.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_instruction: String,
    window: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            window: DEFAULT_MAX_TURNS,
        }
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Validate `new_user_text` and build the prompt for it.
    ///
    /// Returns the trimmed message alongside the prompt so the caller
    /// commits exactly what was rendered.
    pub fn build<'a>(&self, history: &[Turn], new_user_text: &'a str) -> Result<(&'a str, String)> {
        let message = validate_message(new_user_text)?;
        let prompt = render(&self.system_instruction, history, message, self.window);
        Ok((message, prompt))
    }
}
