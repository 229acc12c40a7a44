//! Error types for Parley operations

/// Result type for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Message shown to users when the upstream model API fails.
pub const UPSTREAM_USER_MESSAGE: &str = "Erro na API do modelo. Tente novamente em instantes.";

/// Error types for the Parley relay
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// Rejected user input (e.g. empty message)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upstream generation API failed (auth, quota, transport, bad stream)
    #[error("Upstream API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        /// HTTP status returned by the API, if one was received
        status: Option<u16>,
        /// Full detail, for server-side logs only
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session store error
    #[error("Session error: {0}")]
    Session(String),

    /// The client stopped reading the response
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ParleyError {
    /// Build an upstream error without an HTTP status.
    pub fn upstream(message: impl Into<String>) -> Self {
        ParleyError::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Short name of the error kind, safe to show to users.
    pub fn kind(&self) -> &'static str {
        match self {
            ParleyError::Validation(_) => "Validation",
            ParleyError::Upstream { .. } => "Upstream",
            ParleyError::Configuration(_) => "Configuration",
            ParleyError::Session(_) => "Session",
            ParleyError::ClientDisconnected => "ClientDisconnected",
            ParleyError::Serialization(_) => "Serialization",
            ParleyError::Io(_) => "Io",
            ParleyError::Other(_) => "Other",
        }
    }

    /// Whether this error came from the upstream model API.
    pub fn is_upstream(&self) -> bool {
        matches!(self, ParleyError::Upstream { .. })
    }

    /// Message relayed to the end user. Never carries internal detail
    /// except for validation errors, which describe the user's own input.
    pub fn public_message(&self) -> String {
        match self {
            ParleyError::Validation(msg) => msg.clone(),
            ParleyError::Upstream { .. } => UPSTREAM_USER_MESSAGE.to_string(),
            other => format!("Erro interno ({})", other.kind()),
        }
    }
}

impl From<String> for ParleyError {
    fn from(s: String) -> Self {
        ParleyError::Other(s)
    }
}

impl From<&str> for ParleyError {
    fn from(s: &str) -> Self {
        ParleyError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ParleyError {
    fn from(err: anyhow::Error) -> Self {
        ParleyError::Other(err.to_string())
    }
}

impl From<reqwest::Error> for ParleyError {
    fn from(err: reqwest::Error) -> Self {
        ParleyError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
