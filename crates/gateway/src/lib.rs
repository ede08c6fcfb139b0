//! Local HTTP gateway for Hestia.
//!
//! Serves the same handler the serverless runtime uses, so the assistant can
//! be exercised on a workstation with plain HTTP. There is no function ARN
//! here, so every envelope is labelled `local`.
//!
//! Built on Axum.

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use hestia_lambda::{Envelope, Handler, Lifecycle};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

type SharedHandler = Arc<Handler>;

/// Build the Axum router with all gateway routes.
pub fn build_router(handler: SharedHandler) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(handler)
}

/// Start the gateway HTTP server and serve until Ctrl+C.
pub async fn start(config: hestia_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let handler = Arc::new(hestia_lambda::handler_from_config(config));
    let app = build_router(handler);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed
        std::future::pending::<()>().await;
    }
}

/// Shape a raw HTTP body the way an API gateway proxy event carries it.
fn event_from_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return json!({ "httpMethod": "POST", "path": "/query" });
    }
    json!({
        "httpMethod": "POST",
        "path": "/query",
        "body": String::from_utf8_lossy(body),
    })
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    assistant: &'static str,
}

async fn health_handler(State(handler): State<SharedHandler>) -> Json<HealthResponse> {
    let assistant = match handler.responder().lifecycle() {
        Lifecycle::Uninitialized => "uninitialized",
        Lifecycle::Ready => "ready",
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        assistant,
    })
}

async fn query_handler(State(handler): State<SharedHandler>, body: Bytes) -> (StatusCode, Json<Envelope>) {
    debug!(body_len = body.len(), "Query received");

    let event = event_from_body(&body);
    let envelope = handler.handle(&event, None).await;
    let status =
        StatusCode::from_u16(envelope.status.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(envelope))
}
