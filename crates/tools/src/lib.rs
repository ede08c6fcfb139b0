//! Integrations the Hestia agent can use.
//!
//! Two external services, each with a thin HTTP client and the tools that
//! expose it to the model:
//!
//! - [`grocery`]: a Mealie-compatible recipe and shopping-list service
//! - [`vault`]: a Markdown note vault stored in a GitHub repository

pub mod grocery;
pub mod vault;

use hestia_core::tool::ToolRegistry;
use std::sync::Arc;

pub use grocery::GroceryClient;
pub use vault::VaultClient;

/// Build the registry of every tool backed by the given clients.
pub fn integration_registry(grocery: Arc<GroceryClient>, vault: Arc<VaultClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(grocery::AddToShoppingListTool::new(grocery.clone())));
    registry.register(Box::new(grocery::SearchRecipesTool::new(grocery)));
    registry.register(Box::new(vault::ReadNoteTool::new(vault.clone())));
    registry.register(Box::new(vault::AddTaskTool::new(vault)));
    registry
}

/// Shared HTTP client settings for integration calls.
pub(crate) fn http_client(service: &'static str) -> Result<reqwest::Client, hestia_core::IntegrationError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(concat!("hestia/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| hestia_core::IntegrationError::Network {
            service,
            reason: e.to_string(),
        })
}
