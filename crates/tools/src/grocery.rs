//! Mealie-compatible grocery integration.
//!
//! Only the two calls the assistant needs: add a free-text item to the first
//! shopping list, and search recipes by name.

use async_trait::async_trait;
use hestia_core::error::{IntegrationError, ToolError};
use hestia_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const SERVICE: &str = "grocery";

/// Client for a Mealie instance.
pub struct GroceryClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// A shopping list as returned by the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ShoppingList {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A recipe search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeSummary {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Mealie wraps collections in a paginated envelope.
#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

impl GroceryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: crate::http_client(SERVICE)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<String, IntegrationError> {
        if self.base_url.is_empty() {
            return Err(IntegrationError::NotConfigured {
                service: SERVICE,
                field: "url",
            });
        }
        Ok(format!("{}/api/{}", self.base_url, path.trim_start_matches('/')))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, IntegrationError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .map_err(network)?;
        let response = check_status(response).await?;
        response.json().await.map_err(|e| IntegrationError::InvalidResponse {
            service: SERVICE,
            reason: e.to_string(),
        })
    }

    /// All shopping lists visible to the API key.
    pub async fn shopping_lists(&self) -> Result<Vec<ShoppingList>, IntegrationError> {
        let url = self.endpoint("households/shopping/lists")?;
        let page: Page<ShoppingList> = self.get_json(&url, &[]).await?;
        Ok(page.items)
    }

    /// Add a free-text item to the first shopping list.
    pub async fn add_shopping_item(&self, note: &str) -> Result<ShoppingList, IntegrationError> {
        let list = self
            .shopping_lists()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IntegrationError::NotFound("no shopping list exists".into()))?;

        let url = self.endpoint("households/shopping/items")?;
        debug!(list = %list.name, "Adding shopping list item");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&new_item_body(&list.id, note))
            .send()
            .await
            .map_err(network)?;
        check_status(response).await?;
        Ok(list)
    }

    /// Search recipes by free text.
    pub async fn search_recipes(&self, query: &str, limit: usize) -> Result<Vec<RecipeSummary>, IntegrationError> {
        let url = self.endpoint("recipes")?;
        let per_page = limit.to_string();
        let page: Page<RecipeSummary> = self
            .get_json(&url, &[("search", query), ("perPage", per_page.as_str())])
            .await?;
        Ok(page.items)
    }
}

fn new_item_body(list_id: &str, note: &str) -> serde_json::Value {
    serde_json::json!({
        "shoppingListId": list_id,
        "note": note,
        "quantity": 1,
        "checked": false,
    })
}

fn network(e: reqwest::Error) -> IntegrationError {
    IntegrationError::Network {
        service: SERVICE,
        reason: e.to_string(),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(IntegrationError::Api {
        service: SERVICE,
        status_code: status.as_u16(),
        message,
    })
}

fn execution_failed(tool_name: &str, e: IntegrationError) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: e.to_string(),
    }
}

// --- Tools ---

pub struct AddToShoppingListTool {
    client: Arc<GroceryClient>,
}

impl AddToShoppingListTool {
    pub fn new(client: Arc<GroceryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for AddToShoppingListTool {
    fn name(&self) -> &str {
        "add_to_shopping_list"
    }

    fn description(&self) -> &str {
        "Add one or more items to the household shopping list. Use one entry per item."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Items to add, e.g. [\"2 potatoes\", \"milk\"]"
                }
            },
            "required": ["items"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let items: Vec<String> = arguments["items"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'items' argument".into()));
        }

        let mut list_name = String::new();
        for item in &items {
            let list = self
                .client
                .add_shopping_item(item)
                .await
                .map_err(|e| execution_failed(self.name(), e))?;
            list_name = list.name;
        }

        Ok(ToolResult::ok(format!(
            "Added {} item{} to {}: {}",
            items.len(),
            if items.len() == 1 { "" } else { "s" },
            if list_name.is_empty() { "the shopping list" } else { list_name.as_str() },
            items.join(", ")
        )))
    }
}

pub struct SearchRecipesTool {
    client: Arc<GroceryClient>,
}

impl SearchRecipesTool {
    pub fn new(client: Arc<GroceryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchRecipesTool {
    fn name(&self) -> &str {
        "search_recipes"
    }

    fn description(&self) -> &str {
        "Search the household recipe collection by name or ingredient."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search text" },
                "limit": { "type": "integer", "description": "Maximum results (default 5)", "default": 5 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let limit = arguments["limit"].as_u64().unwrap_or(5).clamp(1, 20) as usize;

        let recipes = self
            .client
            .search_recipes(query, limit)
            .await
            .map_err(|e| execution_failed(self.name(), e))?;

        Ok(ToolResult::ok(format_recipes(query, &recipes)))
    }
}

fn format_recipes(query: &str, recipes: &[RecipeSummary]) -> String {
    if recipes.is_empty() {
        return format!("No recipes found for \"{query}\".");
    }
    recipes
        .iter()
        .map(|r| match r.description.as_deref().filter(|d| !d.is_empty()) {
            Some(desc) => format!("- {}: {}", r.name, desc),
            None => format!("- {}", r.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
