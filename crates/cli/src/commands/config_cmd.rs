//! `agentloop config`: show the effective configuration.

use std::path::Path;

use agentloop_config::AppConfig;

pub fn show(path: Option<&Path>, default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = super::load_config(path)?;
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    println!("# {}", config_path.display());
    print!("{}", render_redacted(&config)?);
    if !config.has_api_key() && config.provider != "ollama" {
        eprintln!("warning: no API key set (AGENTLOOP_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY)");
    }
    Ok(())
}

/// The config as TOML with any API key replaced by `***`.
fn render_redacted(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    shown.api_key = config.has_api_key().then(|| "***".to_string());
    toml::to_string_pretty(&shown)
}
