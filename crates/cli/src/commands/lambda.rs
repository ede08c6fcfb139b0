//! `hestia lambda`: Serve invocations from the Lambda Runtime API.

use hestia_config::AppConfig;
use hestia_lambda::LambdaRuntime;
use tracing::{error, info};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = LambdaRuntime::from_env()?;

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            runtime.report_init_error("ConfigError", &e.to_string()).await?;
            return Err(e.into());
        }
    };

    info!(
        alias = %config.alias,
        production = config.is_production(),
        "Lambda runtime initialized"
    );

    let handler = hestia_lambda::handler_from_config(config);
    runtime.run(&handler).await?;

    Ok(())
}
