//! The serverless entry point for Hestia.
//!
//! - [`envelope`]: the uniform response structure every outcome is wrapped in
//! - [`responder`]: the lazily built, process-wide assistant
//! - [`handler`]: event validation and error mapping
//! - [`runtime`]: the Lambda Runtime API loop

pub mod envelope;
mod finite;
pub mod handler;
pub mod responder;
pub mod runtime;

pub use envelope::{EnvLabel, Envelope, EnvelopeError, Status, make_response};
pub use handler::{Handler, Rejection, extract_query};
pub use responder::{AssistantFactory, ConfiguredFactory, Lifecycle, Responder};
pub use runtime::{Invocation, LambdaRuntime, RuntimeError};

use hestia_config::AppConfig;
use std::sync::Arc;

/// Assemble the handler for a loaded configuration. Nothing is built until
/// the first valid request arrives.
pub fn handler_from_config(config: AppConfig) -> Handler {
    let messages = config.messages.clone();
    Handler::new(Arc::new(Responder::from_config(config)), messages)
}
