//! Configuration loading and validation for Hestia.
//!
//! Everything comes from the process environment, read once at startup into
//! an explicit [`AppConfig`] that is then passed by reference to whatever
//! needs it. Absent values default to empty strings; the collaborators that
//! need them fail later, when they are actually used.
//!
//! User-facing texts ([`Messages`]) have built-in defaults and may be
//! overridden from a TOML file named by `HESTIA_MESSAGES_FILE`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// The root configuration structure.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Chat-completion endpoint and model settings
    pub chat: ChatConfig,

    /// Grocery/recipe service (Mealie-compatible)
    pub grocery: GroceryConfig,

    /// Markdown note vault hosted in a GitHub repository
    pub vault: VaultConfig,

    /// Deployment alias; `prod` marks production
    pub alias: String,

    /// Local HTTP server settings
    pub gateway: GatewayConfig,

    /// Texts placed in fail/error envelopes
    pub messages: Messages,
}

#[derive(Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: OPENROUTER_BASE_URL.into(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Clone, Default)]
pub struct GroceryConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Clone)]
pub struct VaultConfig {
    pub owner: String,
    pub repository: String,
    pub prod_branch: String,
    pub test_branch: String,
    pub token: String,
}

fn default_test_branch() -> String {
    "test".into()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repository: String::new(),
            prod_branch: String::new(),
            test_branch: default_test_branch(),
            token: String::new(),
        }
    }
}

impl VaultConfig {
    /// The branch the vault client should write to.
    pub fn branch(&self, is_production: bool) -> &str {
        if is_production {
            &self.prod_branch
        } else {
            &self.test_branch
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &str) -> &'static str {
    if s.is_empty() { "<unset>" } else { "[REDACTED]" }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl std::fmt::Debug for GroceryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroceryConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("owner", &self.owner)
            .field("repository", &self.repository)
            .field("prod_branch", &self.prod_branch)
            .field("test_branch", &self.test_branch)
            .field("token", &redact(&self.token))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// User-facing texts, grouped the way the override file groups them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default)]
    pub api: ApiMessages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessages {
    #[serde(default = "default_no_query")]
    pub no_query: String,

    #[serde(default = "default_invalid_body")]
    pub invalid_body: String,

    #[serde(default = "default_internal_error")]
    pub internal_error: String,
}

fn default_no_query() -> String {
    "Please include a query in the request body.".into()
}
fn default_invalid_body() -> String {
    "The request body must be a JSON object with a \"query\" field.".into()
}
fn default_internal_error() -> String {
    "Sorry, something went wrong while answering your request.".into()
}

impl Default for ApiMessages {
    fn default() -> Self {
        Self {
            no_query: default_no_query(),
            invalid_body: default_invalid_body(),
            internal_error: default_internal_error(),
        }
    }
}

impl Messages {
    /// Load messages from a TOML file; keys missing from the file keep
    /// their built-in text.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).unwrap_or_default();
        let text_or = |key: &str, default: String| lookup(key).unwrap_or(default);

        let chat = ChatConfig {
            base_url: text_or("OPENROUTER_API_URL", OPENROUTER_BASE_URL.into()),
            api_key: text("OPENROUTER_API_KEY"),
            model: text_or("HESTIA_MODEL", default_model()),
            temperature: parse_or(&lookup, "HESTIA_TEMPERATURE", default_temperature())?,
            max_tokens: parse_or(&lookup, "HESTIA_MAX_TOKENS", default_max_tokens())?,
        };

        let grocery = GroceryConfig {
            url: text("MEALIE_URL"),
            api_key: text("MEALIE_API_KEY"),
        };

        let vault = VaultConfig {
            owner: text("VAULT_OWNER"),
            repository: text("VAULT_REPOSITORY"),
            prod_branch: text("VAULT_PROD_BRANCH"),
            test_branch: text_or("VAULT_TEST_BRANCH", default_test_branch()),
            token: text("VAULT_TOKEN"),
        };

        let gateway = GatewayConfig {
            host: text_or("HESTIA_HOST", default_host()),
            port: parse_or(&lookup, "HESTIA_PORT", default_port())?,
        };

        let messages = match lookup("HESTIA_MESSAGES_FILE").filter(|p| !p.is_empty()) {
            Some(path) => Messages::load_from(&PathBuf::from(path))?,
            None => Messages::default(),
        };

        let config = Self {
            chat,
            grocery,
            vault,
            alias: text("HESTIA_ALIAS"),
            gateway,
            messages,
        };
        config.validate()?;

        tracing::debug!(
            alias = %config.alias,
            model = %config.chat.model,
            vault_branch = %config.vault_branch(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Whether this process serves the production alias.
    pub fn is_production(&self) -> bool {
        self.alias == "prod"
    }

    /// The vault branch selected by the production flag.
    pub fn vault_branch(&self) -> &str {
        self.vault.branch(self.is_production())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::ValidationError(
                "HESTIA_TEMPERATURE must be between 0.0 and 2.0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::ValidationError(format!("{key} has an invalid value: {raw:?}"))
        }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read messages file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse messages file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
