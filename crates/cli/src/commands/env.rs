//! `hestia env`: Show the environment label and the resolved settings.

use hestia_config::AppConfig;
use hestia_lambda::EnvLabel;

pub fn run(arn: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let label = EnvLabel::from_arn(arn.as_deref());
    println!("Environment:  {label}");

    let config = AppConfig::from_env().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("Alias:        {}", if config.alias.is_empty() { "(none)" } else { config.alias.as_str() });
    println!("Production:   {}", config.is_production());
    println!("Model:        {}", config.chat.model);
    println!("Temperature:  {}", config.chat.temperature);
    println!("Vault branch: {}", config.vault_branch());
    println!("Grocery URL:  {}", config.grocery.url);
    println!("API key set:  {}", !config.chat.api_key.is_empty());

    Ok(())
}
