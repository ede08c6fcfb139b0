//! Lazily constructed, process-wide assistant.
//!
//! Building the assistant wires up the chat provider and both integration
//! clients, which is too slow to repeat per request and pointless to do for
//! requests that fail validation. The first request that gets past
//! validation builds it; every later request in the same process reuses it.

use hestia_agent::AgentLoop;
use hestia_config::AppConfig;
use hestia_core::agent::Assistant;
use hestia_providers::OpenAiCompatProvider;
use hestia_tools::{GroceryClient, VaultClient, integration_registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Builds the assistant on first use.
pub trait AssistantFactory: Send + Sync {
    fn build(&self) -> hestia_core::Result<Arc<dyn Assistant>>;
}

/// Builds the real agent from configuration.
pub struct ConfiguredFactory {
    config: AppConfig,
}

impl ConfiguredFactory {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl AssistantFactory for ConfiguredFactory {
    fn build(&self) -> hestia_core::Result<Arc<dyn Assistant>> {
        let config = &self.config;

        let provider = OpenAiCompatProvider::new(
            "openrouter",
            config.chat.base_url.as_str(),
            config.chat.api_key.as_str(),
        )?;

        let grocery = GroceryClient::new(config.grocery.url.as_str(), config.grocery.api_key.as_str())?;

        let vault = VaultClient::new(
            config.vault.owner.as_str(),
            config.vault.repository.as_str(),
            config.vault_branch(),
            config.vault.token.as_str(),
        )?;

        let tools = integration_registry(Arc::new(grocery), Arc::new(vault));
        debug!(tools = tools.len(), "Tool registry assembled");

        let agent = AgentLoop::new(
            Arc::new(provider),
            config.chat.model.as_str(),
            config.chat.temperature,
            Arc::new(tools),
        )
        .with_max_tokens(config.chat.max_tokens);

        info!(
            model = %config.chat.model,
            production = config.is_production(),
            vault_branch = %config.vault_branch(),
            "Assistant constructed"
        );
        Ok(Arc::new(agent))
    }
}

/// Where the shared assistant is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
}

/// Owns the shared assistant and answers queries with it.
pub struct Responder {
    factory: Box<dyn AssistantFactory>,
    assistant: OnceCell<Arc<dyn Assistant>>,
}

impl Responder {
    pub fn new(factory: Box<dyn AssistantFactory>) -> Self {
        Self {
            factory,
            assistant: OnceCell::new(),
        }
    }

    pub fn from_config(config: AppConfig) -> Self {
        Self::new(Box::new(ConfiguredFactory::new(config)))
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.assistant.initialized() {
            Lifecycle::Ready
        } else {
            Lifecycle::Uninitialized
        }
    }

    /// Return the shared assistant, building it if this is the first call.
    ///
    /// Concurrent first calls wait on a single construction. A failed
    /// construction leaves the responder uninitialized, so the next call
    /// tries again.
    pub async fn get_agent(&self) -> hestia_core::Result<Arc<dyn Assistant>> {
        let assistant = self
            .assistant
            .get_or_try_init(|| async {
                debug!("Building assistant");
                self.factory.build()
            })
            .await?;
        Ok(Arc::clone(assistant))
    }

    /// Answer a query with the shared assistant.
    pub async fn respond(&self, query: &str) -> hestia_core::Result<String> {
        let assistant = self.get_agent().await?;
        assistant.run(query).await
    }
}
