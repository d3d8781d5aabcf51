//! Environment variable overrides.
//!
//! Applied on top of the file (or defaults) so container deployments can
//! run without a config file:
//!
//! | Variable                 | Field                          |
//! |--------------------------|--------------------------------|
//! | `PORT`                   | listener port (binds 0.0.0.0)  |
//! | `BIND_ADDRESS`           | `listener.bind_address`        |
//! | `PATTERN`                | `routes.pattern`               |
//! | `PATTERNS`               | `routes.patterns` (comma/whitespace separated) |
//! | `USE_POSITIONAL_PARAMS`  | `routes.parameter_mode`        |
//! | `ALLOWED_PARAMS`         | `routes.allowed_params` (JSON) |
//! | `CACHE_BACKEND`          | `cache.backend`                |
//! | `CACHE_DIR`              | `cache.directory`              |
//! | `CACHE_CLEANUP_INTERVAL` | `cache.sweep_interval_secs`    |
//! | `CACHE_CLEANUP_DELAY`    | `cache.sweep_delay_secs`       |
//! | `API_KEY`                | `admin.api_key`                |
//! | `UPSTREAM_TIMEOUT`       | `upstream.timeout_secs`        |
//! | `LOG_LEVEL`              | `observability.log_level`      |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::CacheBackend;
use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;
use crate::routing::ParameterMode;

/// Apply overrides read through `lookup` (normally `std::env::var`).
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(port) = get("PORT") {
        let port: u16 = parse_var("PORT", &port)?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(addr) = get("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }

    // One pattern source in the environment replaces the other from the file.
    // Setting both is left for the registry to reject.
    let pattern = get("PATTERN");
    let patterns = get("PATTERNS");
    if let Some(pattern) = &pattern {
        config.routes.pattern = Some(pattern.trim().to_string());
        if patterns.is_none() {
            config.routes.patterns.clear();
        }
    }
    if let Some(patterns) = &patterns {
        config.routes.patterns = patterns
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect();
        if pattern.is_none() {
            config.routes.pattern = None;
        }
    }
    if let Some(flag) = get("USE_POSITIONAL_PARAMS") {
        config.routes.parameter_mode = if parse_bool("USE_POSITIONAL_PARAMS", &flag)? {
            ParameterMode::Positional
        } else {
            ParameterMode::Named
        };
    }
    if let Some(raw) = get("ALLOWED_PARAMS") {
        let rules: Vec<BTreeMap<String, String>> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Env {
                var: "ALLOWED_PARAMS".to_string(),
                reason: e.to_string(),
            })?;
        config.routes.allowed_params = rules;
    }

    if let Some(backend) = get("CACHE_BACKEND") {
        config.cache.backend = match backend.trim().to_ascii_lowercase().as_str() {
            "filesystem" | "fs" => CacheBackend::Filesystem,
            "memory" => CacheBackend::Memory,
            other => {
                return Err(ConfigError::Env {
                    var: "CACHE_BACKEND".to_string(),
                    reason: format!("unknown backend '{}'", other),
                })
            }
        };
    }
    if let Some(dir) = get("CACHE_DIR") {
        config.cache.directory = PathBuf::from(dir);
    }
    if let Some(secs) = get("CACHE_CLEANUP_INTERVAL") {
        config.cache.sweep_interval_secs = parse_var("CACHE_CLEANUP_INTERVAL", &secs)?;
    }
    if let Some(secs) = get("CACHE_CLEANUP_DELAY") {
        config.cache.sweep_delay_secs = parse_var("CACHE_CLEANUP_DELAY", &secs)?;
    }

    if let Some(key) = get("API_KEY") {
        config.admin.api_key = Some(key);
    }
    if let Some(secs) = get("UPSTREAM_TIMEOUT") {
        config.upstream.timeout_secs = parse_var("UPSTREAM_TIMEOUT", &secs)?;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    Ok(())
}

fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Env {
            var: var.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
