//! Configuration inspection and editing command.

use crate::config::{self, Config};

/// Show the current configuration, or update and save the given settings.
pub fn cmd_config(
    server_url: Option<&str>,
    server_token: Option<&str>,
    ai_provider: Option<&str>,
    embedding_provider: Option<&str>,
) -> anyhow::Result<()> {
    let mut config = config::load();

    let mut changed = false;
    if let Some(url) = server_url {
        config.server.url = url.to_string();
        changed = true;
    }
    if let Some(token) = server_token {
        config.credentials.server_token = Some(token.to_string());
        changed = true;
    }
    if let Some(provider) = ai_provider {
        config.ai.provider = provider.to_string();
        changed = true;
    }
    if let Some(provider) = embedding_provider {
        config.embedding.provider = provider.to_string();
        changed = true;
    }

    if changed {
        config::save(&config)?;
        println!("Configuration saved.");
        return Ok(());
    }

    if let Some(path) = config::config_path() {
        println!("Config file: {}", path.display());
    }
    println!("{}", toml::to_string_pretty(&redacted(&config))?);
    Ok(())
}

/// Copy of the config with credential values masked for display.
fn redacted(config: &Config) -> Config {
    let mask = |value: &Option<String>| value.as_ref().map(|_| "****".to_string());

    let mut shown = config.clone();
    shown.credentials.server_token = mask(&config.credentials.server_token);
    shown.credentials.gemini_api_key = mask(&config.credentials.gemini_api_key);
    shown.credentials.openai_api_key = mask(&config.credentials.openai_api_key);
    shown.credentials.anthropic_api_key = mask(&config.credentials.anthropic_api_key);
    shown.credentials.cohere_api_key = mask(&config.credentials.cohere_api_key);
    shown
}
