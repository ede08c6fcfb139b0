//! The agent loop behind the Hestia assistant.
//!
//! 1. **Receive** a query
//! 2. **Send to LLM** with the system prompt and the integration tools
//! 3. **If tool calls**: execute them, append results, loop back to step 2
//! 4. **If text response**: that is the answer
//!
//! The loop stops at the first text-only response or at the iteration cap.

pub mod loop_runner;

pub use loop_runner::{AgentLoop, DEFAULT_SYSTEM_PROMPT};
