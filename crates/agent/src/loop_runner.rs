//! The agent reasoning loop implementation.

use async_trait::async_trait;
use hestia_core::agent::Assistant;
use hestia_core::message::{Conversation, Message};
use hestia_core::provider::{Provider, ProviderRequest};
use hestia_core::tool::{ToolCall, ToolRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Hestia, a concise household assistant. \
Answer questions directly. Use the shopping-list tools for groceries and the \
vault tools for tasks and notes. After using a tool, confirm what was done in \
one short sentence.";

const MAX_ITERATIONS_REACHED: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// The core agent loop that orchestrates LLM calls and tool execution.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,

    model: String,

    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    tools: Arc<ToolRegistry>,

    system_prompt: String,

    /// Maximum tool call iterations per query
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 8,
        }
    }

    /// Set the maximum number of tool call iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Process a conversation until the model answers with text.
    pub async fn process(&self, conversation: &mut Conversation) -> hestia_core::Result<String> {
        info!(
            provider = %self.provider.name(),
            messages = conversation.len(),
            "Processing conversation"
        );

        let tool_definitions = self.tools.definitions();
        let mut iteration = 0;

        loop {
            iteration += 1;

            if iteration > self.max_iterations {
                warn!(iterations = iteration, "Max tool iterations reached, forcing text response");
                break;
            }

            debug!(iteration, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                debug!(model = %response.model, tokens = usage.total_tokens, "Completion received");
            }

            if response.message.tool_calls.is_empty() {
                let response_text = response.message.content.clone();
                conversation.push(response.message);
                return Ok(response_text);
            }

            debug!(tool_count = response.message.tool_calls.len(), "Executing tool calls");

            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };

                let start = Instant::now();
                let result = self.tools.execute(&call).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match result {
                    Ok(tool_result) => {
                        debug!(
                            tool = %tc.name,
                            success = tool_result.success,
                            duration_ms,
                            "Tool executed"
                        );
                        conversation.push(Message::tool_result(&tc.id, &tool_result.output));
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, duration_ms, "Tool execution failed");
                        // Report the error to the LLM so it can recover
                        conversation.push(Message::tool_result(&tc.id, format!("Error: {e}")));
                    }
                }
            }
        }

        Ok(MAX_ITERATIONS_REACHED.into())
    }
}

#[async_trait]
impl Assistant for AgentLoop {
    async fn run(&self, query: &str) -> hestia_core::Result<String> {
        let started = Instant::now();
        let mut conversation = Conversation::with_system(&self.system_prompt);
        conversation.push(Message::user(query));

        let answer = self.process(&mut conversation).await?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            turns = conversation.len(),
            "Query answered"
        );
        Ok(answer)
    }
}
