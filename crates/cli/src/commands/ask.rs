//! `hestia ask`: Answer one query through the full handler and print the
//! envelope.

use hestia_config::AppConfig;
use hestia_lambda::Status;
use serde_json::json;

pub async fn run(query: String, arn: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env().map_err(|e| format!("Failed to load config: {e}"))?;
    let handler = hestia_lambda::handler_from_config(config);

    let event = json!({ "body": { "query": query } });
    let envelope = handler.handle(&event, arn.as_deref()).await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if envelope.status != Status::Success {
        return Err(format!("request finished with status {}", envelope.status).into());
    }
    Ok(())
}
