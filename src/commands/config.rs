use anyhow::Result;
use colored::Colorize;
use genai_facts::config::{self, Config};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration with secrets masked
pub fn show(path: Option<&Path>) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: Option<&Path>) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());

    let cfg = config::load_config(path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!("  Model: {}", cfg.model.name);
    println!(
        "  Project: {}",
        cfg.google.project_id.as_deref().unwrap_or("(metadata server)")
    );
    println!(
        "  Telemetry export: {}",
        if cfg.telemetry.export_enabled {
            cfg.telemetry.otlp_endpoint.as_str()
        } else {
            "disabled"
        }
    );

    info!("Configuration validation successful");
    Ok(())
}

/// Sanitize secrets in configuration for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    sanitized.google.access_token = sanitized
        .google
        .access_token
        .as_deref()
        .map(mask_token);
    sanitized
}

/// Mask a token for safe display
///
/// Shows first 7 and last 4 characters with an ellipsis in between
/// Example: "ya29.a0AfH6SMBx1234" -> "ya29.a0...1234"
fn mask_token(token: &str) -> String {
    if token.len() <= 11 || !token.is_ascii() {
        return "***".to_string();
    }

    let prefix = &token[..7];
    let suffix = &token[token.len() - 4..];

    format!("{}...{}", prefix, suffix)
}
