//! `hestia serve`: Start the local HTTP gateway.

use hestia_config::AppConfig;

pub async fn run(port_override: Option<u16>, host_override: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("Hestia gateway");
    println!("   Listening:    http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:        {}", config.chat.model);
    println!("   Vault branch: {}", display_or_unset(config.vault_branch()));

    hestia_gateway::start(config).await?;

    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() { "(unset)" } else { value }
}
