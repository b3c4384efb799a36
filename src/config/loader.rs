//! Configuration loading from disk and the environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay the deployment environment onto a loaded configuration.
///
/// Honors the variables the original deployment used:
/// - `SECOND_APP_URL` — upstream base URL
/// - `PORT` — listener port
/// - `NODE_ENV=production` — production session mode
pub fn apply_env_overrides(config: GatewayConfig) -> GatewayConfig {
    apply_overrides(config, &|name| std::env::var(name).ok())
}

fn apply_overrides(
    mut config: GatewayConfig,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> GatewayConfig {
    if let Some(url) = lookup("SECOND_APP_URL").filter(|u| !u.is_empty()) {
        config.gateway.upstream_url = Some(url);
    }

    if let Some(port) = lookup("PORT").and_then(|p| p.parse::<u16>().ok()) {
        config.listener.bind_address = override_port(&config.listener.bind_address, port);
    }

    if lookup("NODE_ENV").as_deref() == Some("production") {
        config.session.production = true;
    }

    config
}

fn override_port(bind_address: &str, port: u16) -> String {
    match bind_address.parse::<SocketAddr>() {
        Ok(mut addr) => {
            addr.set_port(port);
            addr.to_string()
        }
        Err(_) => format!("0.0.0.0:{}", port),
    }
}
