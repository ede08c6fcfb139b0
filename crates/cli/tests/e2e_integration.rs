//! End-to-end tests for the Hestia request pipeline.
//!
//! These exercise the full path from an incoming event to the response
//! envelope: validation, lazy assistant construction, the agent loop with
//! tool execution, and envelope assembly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hestia_agent::AgentLoop;
use hestia_config::Messages;
use hestia_core::agent::Assistant;
use hestia_core::error::{ProviderError, ToolError};
use hestia_core::message::{Message, MessageToolCall, Role};
use hestia_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use hestia_core::tool::{Tool, ToolRegistry, ToolResult};
use hestia_lambda::{AssistantFactory, EnvLabel, Handler, Responder, Status};
use serde_json::json;

const PROD_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:hestia:prod";

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<ProviderResponse>>,
    call_count: std::sync::Mutex<usize>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            call_count: std::sync::Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        // After a tool round the last message must be the tool's output
        let follows_tool_call = count
            .checked_sub(1)
            .and_then(|i| responses.get(i))
            .is_some_and(|prev| !prev.message.tool_calls.is_empty());
        if follows_tool_call {
            assert_eq!(request.messages.last().map(|m| m.role.clone()), Some(Role::Tool));
        }

        let response = responses
            .get(*count)
            .cloned()
            .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;
        *count += 1;
        Ok(response)
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 40,
            completion_tokens: 12,
            total_tokens: 52,
        }),
        model: "openai/gpt-4o-mini".into(),
    }
}

fn tool_response(name: &str, args: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: "call_e2e".into(),
        name: name.into(),
        arguments: args.to_string(),
    }];
    ProviderResponse {
        message,
        usage: None,
        model: "openai/gpt-4o-mini".into(),
    }
}

// ── In-memory shopping list ──────────────────────────────────────────────

#[derive(Default)]
struct ShoppingList {
    items: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Tool for ShoppingList {
    fn name(&self) -> &str {
        "add_to_shopping_list"
    }

    fn description(&self) -> &str {
        "Add items to the shopping list"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": { "items": { "type": "array" } } })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let items: Vec<String> = arguments["items"]
            .as_array()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'items' argument".into()))?
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
        let summary = format!("Added {} items: {}", items.len(), items.join(", "));
        self.items.lock().unwrap().extend(items);
        Ok(ToolResult::ok(summary))
    }
}

// ── Pipeline assembly ────────────────────────────────────────────────────

struct AgentFactory {
    provider: Arc<ScriptedProvider>,
    list: Arc<ShoppingList>,
    builds: Arc<AtomicUsize>,
}

struct SharedList(Arc<ShoppingList>);

#[async_trait::async_trait]
impl Tool for SharedList {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn description(&self) -> &str {
        self.0.description()
    }
    fn parameters_schema(&self) -> serde_json::Value {
        self.0.parameters_schema()
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.0.execute(arguments).await
    }
}

impl AssistantFactory for AgentFactory {
    fn build(&self) -> hestia_core::Result<Arc<dyn Assistant>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(SharedList(self.list.clone())));
        Ok(Arc::new(AgentLoop::new(
            self.provider.clone(),
            "openai/gpt-4o-mini",
            0.2,
            Arc::new(tools),
        )))
    }
}

struct Pipeline {
    handler: Handler,
    provider: Arc<ScriptedProvider>,
    list: Arc<ShoppingList>,
    builds: Arc<AtomicUsize>,
}

fn pipeline(responses: Vec<ProviderResponse>) -> Pipeline {
    let provider = Arc::new(ScriptedProvider::new(responses));
    let list = Arc::new(ShoppingList::default());
    let builds = Arc::new(AtomicUsize::new(0));
    let factory = AgentFactory {
        provider: provider.clone(),
        list: list.clone(),
        builds: builds.clone(),
    };
    let handler = Handler::new(Arc::new(Responder::new(Box::new(factory))), Messages::default());
    Pipeline {
        handler,
        provider,
        list,
        builds,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_direct_answer() {
    let p = pipeline(vec![text_response("Sad, unhappy and miserable.")]);

    let envelope = p
        .handler
        .handle(
            &json!({ "body": { "query": "What are some antonyms of 'happy'?" } }),
            Some(PROD_ARN),
        )
        .await;

    assert_eq!(envelope.status, Status::Success);
    assert_eq!(envelope.env, EnvLabel::Prod);
    assert_eq!(envelope.data, json!({ "text": "Sad, unhappy and miserable." }));
    assert_eq!(p.provider.calls(), 1);
}

#[tokio::test]
async fn e2e_tool_call_then_answer() {
    let p = pipeline(vec![
        tool_response("add_to_shopping_list", json!({ "items": ["2 potatoes", "milk"] })),
        text_response("Added 2 potatoes and milk to your shopping list."),
    ]);

    let envelope = p
        .handler
        .handle(
            &json!({ "body": r#"{"query": "Add 2 potatoes and milk to my shopping list"}"# }),
            None,
        )
        .await;

    assert_eq!(envelope.status, Status::Success);
    assert_eq!(envelope.env, EnvLabel::Local);
    assert!(envelope.data["text"].as_str().unwrap().contains("potatoes"));
    assert_eq!(*p.list.items.lock().unwrap(), vec!["2 potatoes", "milk"]);
    assert_eq!(p.provider.calls(), 2);
}

#[tokio::test]
async fn e2e_provider_failure_becomes_error_envelope() {
    let p = pipeline(vec![]);

    let envelope = p
        .handler
        .handle(&json!({ "body": { "query": "anything" } }), Some(PROD_ARN))
        .await;

    assert_eq!(envelope.status, Status::Error);
    assert_eq!(envelope.data["error"], Messages::default().api.internal_error);
    assert!(!envelope.to_json().unwrap().contains("script exhausted"));
}

#[tokio::test]
async fn e2e_invalid_requests_never_reach_the_model() {
    let p = pipeline(vec![text_response("unused")]);

    for event in [json!({}), json!({ "body": null }), json!({ "body": { "query": "  " } })] {
        let envelope = p.handler.handle(&event, Some(PROD_ARN)).await;
        assert_eq!(envelope.status, Status::Fail);
    }

    assert_eq!(p.provider.calls(), 0);
    assert_eq!(p.builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn e2e_agent_built_once_across_invocations() {
    let p = pipeline(vec![
        text_response("one"),
        text_response("two"),
        text_response("three"),
    ]);

    let mut ids = Vec::new();
    for query in ["first", "second", "third"] {
        let envelope = p
            .handler
            .handle(&json!({ "body": { "query": query } }), Some(PROD_ARN))
            .await;
        assert_eq!(envelope.status, Status::Success);
        ids.push(envelope.id);
    }

    assert_eq!(p.builds.load(Ordering::SeqCst), 1);
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, ids);
}
