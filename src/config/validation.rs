//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parseable)
//! - Check the mount path and upstream URL shapes before routes are built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system (startup and reload)

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("mount path '{0}' must start with '/'")]
    MountPathNotRooted(String),

    #[error("mount path '{0}' must not end with '/'")]
    MountPathTrailingSlash(String),

    #[error("mount path must not be bare '/'")]
    MountPathIsRoot,

    #[error("upstream URL '{0}' is not a valid URL")]
    InvalidUpstreamUrl(String),

    #[error("upstream URL '{0}' must use http or https")]
    UnsupportedUpstreamScheme(String),

    #[error("upstream URL '{0}' has no host")]
    UpstreamUrlMissingHost(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("session cookie name must not be empty")]
    EmptyCookieName,

    #[error("rewrite_buffer_max_bytes must be greater than zero")]
    ZeroRewriteBuffer,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    validate_mount_path(&config.gateway.mount_path, &mut errors);

    if let Some(url) = &config.gateway.upstream_url {
        validate_upstream_url(url, &mut errors);
    }

    if config.gateway.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_timeout_ms"));
    }
    if config.gateway.request_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("request_timeout_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }
    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("session.ttl_secs"));
    }
    if config.session.touch_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("session.touch_timeout_ms"));
    }
    if config.gateway.rewrite_buffer_max_bytes == 0 {
        errors.push(ValidationError::ZeroRewriteBuffer);
    }
    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_mount_path(mount_path: &str, errors: &mut Vec<ValidationError>) {
    if mount_path == "/" {
        errors.push(ValidationError::MountPathIsRoot);
        return;
    }
    if !mount_path.starts_with('/') {
        errors.push(ValidationError::MountPathNotRooted(mount_path.to_string()));
    }
    if mount_path.ends_with('/') {
        errors.push(ValidationError::MountPathTrailingSlash(
            mount_path.to_string(),
        ));
    }
}

fn validate_upstream_url(raw: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(raw) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                errors.push(ValidationError::UnsupportedUpstreamScheme(raw.to_string()));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::UpstreamUrlMissingHost(raw.to_string()));
            }
        }
        Err(_) => errors.push(ValidationError::InvalidUpstreamUrl(raw.to_string())),
    }
}
