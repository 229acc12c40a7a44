//! Configuration types for Parley

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conversation::{
    DEFAULT_MAX_TURNS, DEFAULT_SESSION_TTL, DEFAULT_SYSTEM_INSTRUCTION, MAX_SESSION_TTL,
};
use crate::error::{ParleyError, Result};
use crate::relay::WireFormat;

/// Secret used when none is configured. Signed cookies are forgeable with it.
pub const INSECURE_SECRET_KEY: &str = "chave_insegura_nao_usar_em_producao";

/// Variables understood for compatibility with the flat `.env` layout.
/// The selected provider's key and model variables are added to these.
const FLAT_ENV_KEYS: &[&str] = &[
    "FLASK_SECRET_KEY",
    "SECRET_KEY",
    "FLASK_DEBUG",
    "DEBUG",
    "MAX_TURNS",
];

/// Main configuration, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParleyConfig {
    /// HTTP listener configuration
    pub server: ServerConfig,

    /// Upstream model configuration
    pub llm: LLMProviderConfig,

    /// Session store configuration
    pub session: SessionConfig,

    /// Prompt assembly configuration
    pub prompt: PromptConfig,

    /// Streaming response configuration
    pub stream: StreamConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Verbose logging; accepts `true`, `1`, `yes`
    #[serde(deserialize_with = "deserialize_flag")]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            debug: false,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProviderType,

    /// Model name
    pub model: String,

    /// API key (falls back to the provider's own env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for proxies or compatible endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            provider: LLMProviderType::Gemini,
            model: String::new(),
            api_key: None,
            base_url: None,
        }
    }
}

impl LLMProviderConfig {
    /// Configured key, or the provider's environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(self.provider.api_key_env()).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProviderType {
    Gemini,
    OpenAI,
}

impl LLMProviderType {
    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LLMProviderType::Gemini => "GEMINI_API_KEY",
            LLMProviderType::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Environment variable naming this provider's model
    pub fn model_env(&self) -> &'static str {
        match self {
            LLMProviderType::Gemini => "GEMINI_MODEL",
            LLMProviderType::OpenAI => "OPENAI_MODEL",
        }
    }

    /// Model used when none is configured
    pub const fn default_model(&self) -> &'static str {
        match self {
            LLMProviderType::Gemini => "gemini-2.5-flash",
            LLMProviderType::OpenAI => "gpt-4o-mini",
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key used to sign session cookies
    pub secret_key: String,

    /// Lifetime of a session after its last write
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Name of the session cookie
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret_key: INSECURE_SECRET_KEY.to_string(),
            ttl: DEFAULT_SESSION_TTL,
            cookie_name: "parley_session".to_string(),
        }
    }
}

/// Prompt assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// How many prior turns are rendered into each prompt
    pub max_turns: usize,

    /// Persona preamble
    pub system_instruction: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// Streaming response configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Wire format when the client expresses no preference
    pub default_format: WireFormat,

    /// Frames buffered between the relay and the response body
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_format: WireFormat::PlainText,
            channel_capacity: 16,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to a daily-rolling file
    pub file_enabled: bool,

    /// Directory for the log file
    pub directory: PathBuf,

    /// Log file name prefix
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: true,
            directory: PathBuf::from("."),
            file_name: "app.log".to_string(),
        }
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Text(s) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    })
}

/// Flat variables for `provider`; another provider's key never leaks in.
fn flat_env(provider: LLMProviderType) -> Env {
    let mut keys = FLAT_ENV_KEYS.to_vec();
    keys.extend([provider.api_key_env(), provider.model_env()]);

    Env::raw().only(&keys).map(move |key| {
        let mapped = if key == provider.api_key_env() {
            "llm.api_key"
        } else if key == provider.model_env() {
            "llm.model"
        } else if key == "FLASK_SECRET_KEY" || key == "SECRET_KEY" {
            "session.secret_key"
        } else if key == "FLASK_DEBUG" || key == "DEBUG" {
            "server.debug"
        } else {
            "prompt.max_turns"
        };
        mapped.into()
    })
}

fn prefixed_env() -> Env {
    Env::prefixed("PARLEY_").split("__")
}

impl ParleyConfig {
    /// Build the layered figment without extracting it.
    ///
    /// Layers, lowest priority first:
    /// 1. Defaults
    /// 2. `parley.toml`, then `PARLEY_CONFIG_PATH`, then `path`
    /// 3. Flat variables (`FLASK_DEBUG`, `MAX_TURNS`, ...) plus the key and
    ///    model variables of the selected provider (`GEMINI_API_KEY` or
    ///    `OPENAI_API_KEY`)
    /// 4. `PARLEY_` prefixed variables, `__` separating sections
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ParleyConfig::default()))
            .merge(Toml::file("parley.toml"));

        // Check for custom config path
        if let Ok(env_path) = std::env::var("PARLEY_CONFIG_PATH") {
            figment = figment.merge(Toml::file(env_path));
        }
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        let provider = figment
            .clone()
            .merge(prefixed_env())
            .extract_inner::<LLMProviderType>("llm.provider")
            .unwrap_or(LLMProviderType::Gemini);

        figment.merge(flat_env(provider)).merge(prefixed_env())
    }

    /// Load configuration from files and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or the result
    /// fails validation (e.g. no API key).
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, merging an explicit file on top of the defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config = Self::extract_from(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge all layers without validating the result.
    ///
    /// For tooling that never talks to the upstream API.
    pub fn extract_from(path: Option<&Path>) -> Result<Self> {
        Self::figment(path).extract().map_err(|e| {
            ParleyError::Configuration(format!("Failed to load configuration: {}", e))
        })
    }

    /// Model name, falling back to the provider default.
    pub fn model(&self) -> &str {
        if !self.llm.model.is_empty() {
            return &self.llm.model;
        }
        self.llm.provider.default_model()
    }

    /// Whether the built-in, publicly known secret is in use
    pub fn uses_insecure_secret(&self) -> bool {
        self.session.secret_key == INSECURE_SECRET_KEY
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.llm.resolved_api_key().is_none() {
            return Err(ParleyError::Configuration(format!(
                "Missing API key: set {} or llm.api_key",
                self.llm.provider.api_key_env()
            )));
        }
        if self.prompt.max_turns == 0 {
            return Err(ParleyError::Configuration(
                "prompt.max_turns must be at least 1".to_string(),
            ));
        }
        if self.stream.channel_capacity == 0 {
            return Err(ParleyError::Configuration(
                "stream.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ParleyError::Configuration(
                "session.cookie_name must not be empty".to_string(),
            ));
        }
        if self.session.ttl.is_zero() || self.session.ttl > MAX_SESSION_TTL {
            return Err(ParleyError::Configuration(format!(
                "session.ttl must be between 1s and {} days",
                MAX_SESSION_TTL.as_secs() / 86_400
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = ParleyConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.prompt.max_turns, 12);
        assert_eq!(config.session.ttl, Duration::from_secs(7200));
        assert_eq!(config.stream.default_format, WireFormat::PlainText);
        assert_eq!(config.model(), "gemini-2.5-flash");
        assert!(config.uses_insecure_secret());
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let err = ParleyConfig::load().unwrap_err();
            assert!(err.to_string().contains("GEMINI_API_KEY"));
            Ok(())
        });
    }

    #[test]
    fn test_flat_env_variables() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("GEMINI_API_KEY", "AIza-test");
            jail.set_env("GEMINI_MODEL", "gemini-2.5-pro");
            jail.set_env("FLASK_SECRET_KEY", "s3cret");
            jail.set_env("FLASK_DEBUG", "yes");
            jail.set_env("MAX_TURNS", "6");

            let config = ParleyConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.llm.api_key.as_deref(), Some("AIza-test"));
            assert_eq!(config.model(), "gemini-2.5-pro");
            assert_eq!(config.session.secret_key, "s3cret");
            assert!(config.server.debug);
            assert_eq!(config.prompt.max_turns, 6);
            assert!(!config.uses_insecure_secret());
            Ok(())
        });
    }

    #[test]
    fn test_flat_keys_follow_selected_provider() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("parley.toml", "[llm]\nprovider = \"openai\"\n")?;
            jail.set_env("GEMINI_API_KEY", "AIza-gemini");
            jail.set_env("GEMINI_MODEL", "gemini-2.5-pro");
            jail.set_env("OPENAI_API_KEY", "sk-openai");

            let config = ParleyConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.llm.provider, LLMProviderType::OpenAI);
            assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));
            assert_eq!(config.llm.resolved_api_key().as_deref(), Some("sk-openai"));
            assert_eq!(config.model(), "gpt-4o-mini");
            Ok(())
        });
    }

    #[test]
    fn test_provider_from_prefixed_env_selects_flat_keys() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("PARLEY_LLM__PROVIDER", "openai");
            jail.set_env("GEMINI_API_KEY", "AIza-gemini");

            let err = ParleyConfig::load().unwrap_err();
            assert!(err.to_string().contains("OPENAI_API_KEY"));

            jail.set_env("OPENAI_API_KEY", "sk-openai");
            jail.set_env("OPENAI_MODEL", "gpt-4o");
            let config = ParleyConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));
            assert_eq!(config.model(), "gpt-4o");
            Ok(())
        });
    }

    #[test]
    fn test_debug_flag_forms() {
        for (raw, expected) in [("1", true), ("true", true), ("False", false), ("0", false)] {
            Jail::expect_with(|jail| {
                jail.clear_env();
                jail.set_env("GEMINI_API_KEY", "k");
                jail.set_env("FLASK_DEBUG", raw);
                let config = ParleyConfig::load().map_err(|e| e.to_string())?;
                assert_eq!(config.server.debug, expected, "FLASK_DEBUG={raw}");
                Ok(())
            });
        }
    }

    #[test]
    fn test_toml_file_and_prefixed_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "parley.toml",
                r#"
                [server]
                port = 8080

                [llm]
                provider = "openai"
                model = "gpt-4o"
                api_key = "sk-file"

                [session]
                ttl = "30m"

                [stream]
                default_format = "sse"
                "#,
            )?;
            jail.set_env("PARLEY_SERVER__PORT", "9090");
            jail.set_env("PARLEY_PROMPT__MAX_TURNS", "4");

            let config = ParleyConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 9090);
            assert_eq!(config.llm.provider, LLMProviderType::OpenAI);
            assert_eq!(config.model(), "gpt-4o");
            assert_eq!(config.session.ttl, Duration::from_secs(30 * 60));
            assert_eq!(config.stream.default_format, WireFormat::EventStream);
            assert_eq!(config.prompt.max_turns, 4);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path_and_validation() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("custom.toml", "[prompt]\nmax_turns = 0\n")?;
            jail.set_env("GEMINI_API_KEY", "k");

            let err = ParleyConfig::load_from(Some(Path::new("custom.toml"))).unwrap_err();
            assert!(err.to_string().contains("max_turns"));
            Ok(())
        });
    }

    #[test]
    fn test_insecure_secret_passes_validation() {
        let mut config = ParleyConfig::default();
        config.llm.api_key = Some("k".to_string());

        assert!(config.uses_insecure_secret());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_ttl_is_bounded() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("GEMINI_API_KEY", "k");

            for ttl in ["1000000y", "0s", "401days"] {
                jail.set_env("PARLEY_SESSION__TTL", ttl);
                let err = ParleyConfig::load().unwrap_err();
                assert!(err.to_string().contains("session.ttl"), "ttl={ttl}");
            }

            jail.set_env("PARLEY_SESSION__TTL", "400days");
            let config = ParleyConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.session.ttl, MAX_SESSION_TTL);
            Ok(())
        });
    }
}
