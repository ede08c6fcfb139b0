//! # Hestia Core
//!
//! Domain types, traits, and error definitions shared by every Hestia crate.
//! Nothing in here talks to the network; implementations live in their
//! respective crates and depend inward on this one.
//!
//! The seams:
//! - [`Provider`]: a chat-completion backend
//! - [`Tool`]: something the agent may call (grocery list, note vault, ...)
//! - [`Assistant`]: the single `run(query) -> text` operation the request
//!   handler consumes

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

pub use agent::Assistant;
pub use error::{Error, IntegrationError, ProviderError, Result, ToolError};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
