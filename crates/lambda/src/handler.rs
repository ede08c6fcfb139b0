//! Request handling: validate the incoming event, ask the assistant, and
//! wrap whatever happened in an envelope.

use crate::envelope::{Envelope, Status};
use crate::responder::Responder;
use hestia_config::Messages;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

/// Why an event was turned away before reaching the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No body, or a body without a usable `query`
    NoQuery,
    /// A body that is not a JSON object
    InvalidBody,
}

/// Pull the query out of an API-gateway style event.
///
/// The body may be an object or a string holding JSON text. The returned
/// query is the caller's string, untrimmed.
pub fn extract_query(event: &Value) -> Result<String, Rejection> {
    let Some(body) = event.get("body") else {
        return Err(Rejection::NoQuery);
    };

    let decoded;
    let body = match body {
        Value::String(raw) => {
            decoded = serde_json::from_str::<Value>(raw).map_err(|_| Rejection::InvalidBody)?;
            &decoded
        }
        other => other,
    };

    let Value::Object(fields) = body else {
        return Err(Rejection::InvalidBody);
    };

    match fields.get("query").and_then(Value::as_str) {
        Some(query) if !query.trim().is_empty() => Ok(query.to_string()),
        _ => Err(Rejection::NoQuery),
    }
}

/// Turns events into envelopes.
#[derive(Clone)]
pub struct Handler {
    responder: Arc<Responder>,
    messages: Messages,
}

impl Handler {
    pub fn new(responder: Arc<Responder>, messages: Messages) -> Self {
        Self { responder, messages }
    }

    pub fn responder(&self) -> &Arc<Responder> {
        &self.responder
    }

    /// Handle one event. Every outcome is an envelope; the caller picks the
    /// transport status from [`Status::http_code`].
    pub async fn handle(&self, event: &Value, arn: Option<&str>) -> Envelope {
        let query = match extract_query(event) {
            Ok(query) => query,
            Err(rejection) => {
                let text = match rejection {
                    Rejection::NoQuery => &self.messages.api.no_query,
                    Rejection::InvalidBody => &self.messages.api.invalid_body,
                };
                info!(?rejection, "Rejected request");
                return Envelope::from_value(json!({ "fail": text }), Status::Fail, arn);
            }
        };

        info!(query_len = query.len(), "Answering query");

        match self.responder.respond(&query).await {
            Ok(answer) => Envelope::from_value(json!({ "text": answer }), Status::Success, arn),
            Err(e) => {
                error!(error = %e, "Failed to answer query");
                Envelope::from_value(
                    json!({ "error": self.messages.api.internal_error }),
                    Status::Error,
                    arn,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvLabel;
    use crate::responder::AssistantFactory;
    use async_trait::async_trait;
    use hestia_core::agent::Assistant;
    use hestia_core::error::ProviderError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Assistant for Recorder {
        async fn run(&self, query: &str) -> hestia_core::Result<String> {
            self.queries.lock().unwrap().push(query.to_string());
            if query.contains("explode") {
                return Err(ProviderError::AuthenticationFailed("sk-or-secret rejected".into()).into());
            }
            Ok("Sad, unhappy, gloomy.".into())
        }
    }

    struct Shared(Arc<Recorder>);

    impl AssistantFactory for Shared {
        fn build(&self) -> hestia_core::Result<Arc<dyn Assistant>> {
            Ok(self.0.clone())
        }
    }

    fn handler() -> (Handler, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let responder = Arc::new(Responder::new(Box::new(Shared(recorder.clone()))));
        (Handler::new(responder, Messages::default()), recorder)
    }

    #[test]
    fn extract_from_object_body() {
        let event = json!({ "body": { "query": "hi" } });
        assert_eq!(extract_query(&event).unwrap(), "hi");
    }

    #[test]
    fn extract_from_json_text_body() {
        let event = json!({ "body": r#"{"query": "  hi  "}"# });
        assert_eq!(extract_query(&event).unwrap(), "  hi  ");
    }

    #[test]
    fn missing_or_unusable_query() {
        for event in [
            json!({}),
            json!(null),
            json!({ "body": {} }),
            json!({ "body": { "query": null } }),
            json!({ "body": { "query": [] } }),
            json!({ "body": { "query": 42 } }),
            json!({ "body": { "query": "" } }),
            json!({ "body": { "query": "   " } }),
            json!({ "body": "{\"q\": \"typo\"}" }),
        ] {
            assert_eq!(extract_query(&event), Err(Rejection::NoQuery), "{event}");
        }
    }

    #[test]
    fn non_object_bodies() {
        for event in [
            json!({ "body": null }),
            json!({ "body": [] }),
            json!({ "body": 3 }),
            json!({ "body": "str" }),
            json!({ "body": "" }),
            json!({ "body": "[1, 2]" }),
            json!({ "body": "\"quoted\"" }),
        ] {
            assert_eq!(extract_query(&event), Err(Rejection::InvalidBody), "{event}");
        }
    }

    #[tokio::test]
    async fn success_wraps_answer() {
        let (handler, recorder) = handler();
        let event = json!({ "body": { "query": "What are some antonyms of 'happy'?" } });

        let envelope = handler
            .handle(&event, Some("arn:aws:lambda:us-east-1:1:function:hestia:staging"))
            .await;

        assert_eq!(envelope.status, Status::Success);
        assert_eq!(envelope.env, EnvLabel::Staging);
        assert!(envelope.data["text"].as_str().unwrap().to_lowercase().contains("sad"));
        assert_eq!(recorder.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejections_never_build_the_assistant() {
        let (handler, recorder) = handler();

        let envelope = handler.handle(&json!({}), None).await;
        assert_eq!(envelope.status, Status::Fail);
        assert_eq!(envelope.data["fail"], Messages::default().api.no_query);

        let envelope = handler.handle(&json!({ "body": [] }), None).await;
        assert_eq!(envelope.data["fail"], Messages::default().api.invalid_body);

        assert!(recorder.queries.lock().unwrap().is_empty());
        assert_eq!(
            handler.responder().lifecycle(),
            crate::responder::Lifecycle::Uninitialized
        );
    }

    #[tokio::test]
    async fn assistant_errors_are_not_leaked() {
        let (handler, _) = handler();
        let envelope = handler
            .handle(&json!({ "body": { "query": "explode" } }), None)
            .await;

        assert_eq!(envelope.status, Status::Error);
        assert_eq!(envelope.data["error"], Messages::default().api.internal_error);
        assert!(!envelope.to_json().unwrap().contains("sk-or-secret"));
    }

    #[tokio::test]
    async fn custom_messages_are_used() {
        let recorder = Arc::new(Recorder::default());
        let responder = Arc::new(Responder::new(Box::new(Shared(recorder))));
        let mut messages = Messages::default();
        messages.api.no_query = "Ask me something.".into();

        let handler = Handler::new(responder, messages);
        let envelope = handler.handle(&json!({ "body": {} }), None).await;
        assert_eq!(envelope.data, json!({ "fail": "Ask me something." }));
    }
}
