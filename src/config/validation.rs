//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Template and allow-list compilation happen when the registry is built,
//!   since that is where their compiled forms live

use std::net::SocketAddr;

use thiserror::Error;

use crate::cache::CacheBackend;
use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("cache.directory must not be empty for the filesystem backend")]
    EmptyCacheDirectory,

    #[error("admin.api_key must not be empty when set")]
    EmptyApiKey,
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::Zero("upstream.timeout_secs"));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero("cache.sweep_interval_secs"));
    }
    if config.cache.backend == CacheBackend::Filesystem
        && config.cache.directory.as_os_str().is_empty()
    {
        errors.push(ValidationError::EmptyCacheDirectory);
    }
    if matches!(config.admin.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
        errors.push(ValidationError::EmptyApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
