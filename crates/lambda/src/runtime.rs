//! Client for the AWS Lambda Runtime API.
//!
//! A custom runtime pulls one invocation at a time from the local runtime
//! endpoint, hands the event to the [`Handler`], and posts the encoded
//! envelope back. The process stays warm between invocations, which is what
//! makes the shared assistant worth caching.

use crate::handler::Handler;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument};

pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
const API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "lambda-runtime-aws-request-id";
const FUNCTION_ARN_HEADER: &str = "lambda-runtime-invoked-function-arn";
const TRACE_ID_HEADER: &str = "lambda-runtime-trace-id";

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("AWS_LAMBDA_RUNTIME_API is not set; not running inside Lambda")]
    MissingEndpoint,

    #[error("Runtime API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Runtime API answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invocation is missing the {0} header")]
    MissingHeader(&'static str),
}

/// One pending invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request_id: String,
    pub function_arn: Option<String>,
    pub trace_id: Option<String>,
    /// The decoded event, or the decode failure message
    pub event: Result<Value, String>,
}

impl Invocation {
    pub fn from_parts(headers: &HeaderMap, body: &[u8]) -> Result<Self, RuntimeError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let request_id = header(REQUEST_ID_HEADER).ok_or(RuntimeError::MissingHeader(REQUEST_ID_HEADER))?;

        Ok(Self {
            request_id,
            function_arn: header(FUNCTION_ARN_HEADER),
            trace_id: header(TRACE_ID_HEADER),
            event: serde_json::from_slice(body).map_err(|e| e.to_string()),
        })
    }
}

/// The runtime loop.
pub struct LambdaRuntime {
    base_url: String,
    client: reqwest::Client,
}

impl LambdaRuntime {
    pub fn new(endpoint: &str) -> Result<Self, RuntimeError> {
        // The next-invocation call long-polls, so no overall timeout
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            base_url: format!("http://{}/{API_VERSION}/runtime", endpoint.trim_end_matches('/')),
            client,
        })
    }

    pub fn from_env() -> Result<Self, RuntimeError> {
        let endpoint = std::env::var(RUNTIME_API_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(RuntimeError::MissingEndpoint)?;
        Self::new(&endpoint)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Serve invocations until fetching the next one fails. A result the
    /// platform refuses is logged and the loop moves on.
    pub async fn run(&self, handler: &Handler) -> Result<(), RuntimeError> {
        info!(endpoint = %self.base_url, "Lambda runtime started");
        loop {
            let invocation = self.next_invocation().await?;
            let span = info_span!("invocation", request_id = %invocation.request_id);
            async {
                if let Err(e) = self.process(handler, invocation).await {
                    error!(error = %e, "Invocation result was not delivered");
                }
            }
            .instrument(span)
            .await;
        }
    }

    async fn process(&self, handler: &Handler, invocation: Invocation) -> Result<(), RuntimeError> {
        if let Some(trace_id) = &invocation.trace_id {
            debug!(%trace_id, "Trace context received");
        }

        let event = match invocation.event {
            Ok(event) => event,
            Err(reason) => {
                error!(%reason, "Event is not valid JSON");
                return self
                    .post_error(&invocation.request_id, "InvalidEvent", &reason)
                    .await;
            }
        };

        let envelope = handler.handle(&event, invocation.function_arn.as_deref()).await;
        match envelope.to_json() {
            Ok(body) => {
                debug!(status = %envelope.status, "Posting response");
                let posted = self
                    .post(&format!("invocation/{}/response", invocation.request_id), body)
                    .await;
                match posted {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        error!(error = %e, "Runtime API rejected the response");
                        self.post_error(&invocation.request_id, "ResponseRejected", &e.to_string())
                            .await
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to encode response");
                self.post_error(&invocation.request_id, "EncodeError", &e.to_string())
                    .await
            }
        }
    }

    /// Block until the platform hands over the next event.
    pub async fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let response = self
            .client
            .get(format!("{}/invocation/next", self.base_url))
            .send()
            .await?;
        let response = check_status(response).await?;
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Invocation::from_parts(&headers, &body)
    }

    /// Report a failure that happened before the first invocation.
    pub async fn report_init_error(&self, error_type: &str, message: &str) -> Result<(), RuntimeError> {
        self.post("init/error", error_body(error_type, message)).await
    }

    async fn post_error(&self, request_id: &str, error_type: &str, message: &str) -> Result<(), RuntimeError> {
        self.post(&format!("invocation/{request_id}/error"), error_body(error_type, message))
            .await
    }

    async fn post(&self, path: &str, body: String) -> Result<(), RuntimeError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

fn error_body(error_type: &str, message: &str) -> String {
    json!({ "errorType": error_type, "errorMessage": message }).to_string()
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RuntimeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RuntimeError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{AssistantFactory, Responder};
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use hestia_config::Messages;
    use hestia_core::agent::Assistant;
    use reqwest::header::{HeaderName, HeaderValue};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const PROD_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:hestia:prod";

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn invocation_from_headers() {
        let map = headers(&[
            ("Lambda-Runtime-Aws-Request-Id", "8476a536-e9f4-11e8-9739-2dfe598c3fcd"),
            (
                "Lambda-Runtime-Invoked-Function-Arn",
                "arn:aws:lambda:us-east-1:123456789012:function:hestia:prod",
            ),
            ("Lambda-Runtime-Trace-Id", "Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700"),
        ]);
        let invocation = Invocation::from_parts(&map, br#"{"body": {"query": "hi"}}"#).unwrap();

        assert_eq!(invocation.request_id, "8476a536-e9f4-11e8-9739-2dfe598c3fcd");
        assert!(invocation.function_arn.unwrap().ends_with(":prod"));
        assert_eq!(invocation.event.unwrap()["body"]["query"], "hi");
    }

    #[test]
    fn request_id_is_required() {
        let map = headers(&[("Lambda-Runtime-Invoked-Function-Arn", "arn:x")]);
        let err = Invocation::from_parts(&map, b"{}").unwrap_err();
        assert!(matches!(err, RuntimeError::MissingHeader(REQUEST_ID_HEADER)));
    }

    #[test]
    fn arn_is_optional() {
        let map = headers(&[("Lambda-Runtime-Aws-Request-Id", "abc")]);
        let invocation = Invocation::from_parts(&map, b"{}").unwrap();
        assert!(invocation.function_arn.is_none());
    }

    #[test]
    fn undecodable_event_is_kept_as_error() {
        let map = headers(&[("Lambda-Runtime-Aws-Request-Id", "abc")]);
        let invocation = Invocation::from_parts(&map, b"not json").unwrap();
        assert!(invocation.event.is_err());
    }

    #[test]
    fn base_url_layout() {
        let runtime = LambdaRuntime::new("127.0.0.1:9001").unwrap();
        assert_eq!(runtime.base_url(), "http://127.0.0.1:9001/2018-06-01/runtime");
    }

    #[test]
    fn error_body_shape() {
        let body: Value = serde_json::from_str(&error_body("EncodeError", "boom")).unwrap();
        assert_eq!(body, json!({ "errorType": "EncodeError", "errorMessage": "boom" }));
    }

    // Runtime API stand-in: hands out queued events, records what comes back,
    // and answers 500 on `next` once the queue is empty.
    #[derive(Clone, Default)]
    struct FakeApi {
        pending: Arc<Mutex<VecDeque<(&'static str, &'static str)>>>,
        responses: Arc<Mutex<Vec<(String, Value)>>>,
        errors: Arc<Mutex<Vec<(String, Value)>>>,
        reject_responses: bool,
    }

    impl FakeApi {
        fn with_events(events: &[(&'static str, &'static str)]) -> Self {
            let api = Self::default();
            api.pending.lock().unwrap().extend(events.iter().copied());
            api
        }
    }

    async fn next_event(State(api): State<FakeApi>) -> Response {
        let next = api.pending.lock().unwrap().pop_front();
        match next {
            Some((request_id, body)) => (
                [(REQUEST_ID_HEADER, request_id), (FUNCTION_ARN_HEADER, PROD_ARN)],
                body,
            )
                .into_response(),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "queue drained").into_response(),
        }
    }

    async fn record_response(
        State(api): State<FakeApi>,
        Path(request_id): Path<String>,
        body: Bytes,
    ) -> StatusCode {
        if api.reject_responses {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        let value = serde_json::from_slice(&body).unwrap();
        api.responses.lock().unwrap().push((request_id, value));
        StatusCode::ACCEPTED
    }

    async fn record_error(
        State(api): State<FakeApi>,
        Path(request_id): Path<String>,
        body: Bytes,
    ) -> StatusCode {
        let value = serde_json::from_slice(&body).unwrap();
        api.errors.lock().unwrap().push((request_id, value));
        StatusCode::ACCEPTED
    }

    async fn serve(api: FakeApi) -> LambdaRuntime {
        let app = axum::Router::new()
            .route("/2018-06-01/runtime/invocation/next", get(next_event))
            .route("/2018-06-01/runtime/invocation/{id}/response", post(record_response))
            .route("/2018-06-01/runtime/invocation/{id}/error", post(record_error))
            .with_state(api);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        LambdaRuntime::new(&addr.to_string()).unwrap()
    }

    struct Echo;

    #[async_trait]
    impl Assistant for Echo {
        async fn run(&self, query: &str) -> hestia_core::Result<String> {
            Ok(format!("echo: {query}"))
        }
    }

    struct EchoFactory;

    impl AssistantFactory for EchoFactory {
        fn build(&self) -> hestia_core::Result<Arc<dyn Assistant>> {
            Ok(Arc::new(Echo))
        }
    }

    fn echo_handler() -> Handler {
        Handler::new(Arc::new(Responder::new(Box::new(EchoFactory))), Messages::default())
    }

    fn assert_drained(result: Result<(), RuntimeError>) {
        assert!(matches!(result, Err(RuntimeError::Status { status: 500, .. })), "{result:?}");
    }

    #[tokio::test]
    async fn envelope_is_posted_to_response() {
        let api = FakeApi::with_events(&[
            ("req-1", r#"{"body": {"query": "hello"}}"#),
            ("req-2", "{}"),
        ]);
        let runtime = serve(api.clone()).await;

        assert_drained(runtime.run(&echo_handler()).await);

        let responses = api.responses.lock().unwrap();
        assert_eq!(responses.len(), 2);
        let (id, envelope) = &responses[0];
        assert_eq!(id, "req-1");
        assert_eq!(envelope["status"], "success");
        assert_eq!(envelope["env"], "prod");
        assert_eq!(envelope["data"]["text"], "echo: hello");
        assert_eq!(responses[1].1["status"], "fail");
        assert!(api.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_json_event_is_posted_to_error() {
        let api = FakeApi::with_events(&[("req-bad", "not json")]);
        let runtime = serve(api.clone()).await;

        assert_drained(runtime.run(&echo_handler()).await);

        assert!(api.responses.lock().unwrap().is_empty());
        let errors = api.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "req-bad");
        assert_eq!(errors[0].1["errorType"], "InvalidEvent");
    }

    #[tokio::test]
    async fn rejected_response_does_not_stop_the_loop() {
        let mut api = FakeApi::with_events(&[
            ("req-1", r#"{"body": {"query": "a"}}"#),
            ("req-2", r#"{"body": {"query": "b"}}"#),
        ]);
        api.reject_responses = true;
        let runtime = serve(api.clone()).await;

        assert_drained(runtime.run(&echo_handler()).await);

        let errors = api.errors.lock().unwrap();
        let ids: Vec<&str> = errors.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["req-1", "req-2"]);
        assert!(errors.iter().all(|(_, body)| body["errorType"] == "ResponseRejected"));
    }

    #[tokio::test]
    async fn next_invocation_reads_headers_and_body() {
        let api = FakeApi::with_events(&[("req-9", r#"{"k": 1}"#)]);
        let runtime = serve(api).await;

        let invocation = runtime.next_invocation().await.unwrap();
        assert_eq!(invocation.request_id, "req-9");
        assert_eq!(invocation.function_arn.as_deref(), Some(PROD_ARN));
        assert_eq!(invocation.event, Ok(json!({ "k": 1 })));
    }
}
