//! Error types for the Hestia domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for agent and collaborator operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures talking to the grocery service or the note vault.
#[derive(Debug, Clone, Error)]
pub enum IntegrationError {
    #[error("{service} is not configured: missing {field}")]
    NotConfigured {
        service: &'static str,
        field: &'static str,
    },

    #[error("{service} request failed with status {status_code}: {message}")]
    Api {
        service: &'static str,
        status_code: u16,
        message: String,
    },

    #[error("{service} returned an unexpected payload: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("{service} network error: {reason}")]
    Network {
        service: &'static str,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
