//! Configuration module for environment variable parsing.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::dispatch::{DEFAULT_MAX_BODY_BYTES, DEFAULT_POOL_SIZE};

/// Route of the liveness endpoint; the webhook may not share it.
pub const HEALTH_PATH: &str = "/health";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token shared with the platform for signature verification
    pub token: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Path the platform pushes to
    pub webhook_path: String,

    /// Idle message objects kept (and pre-allocated) in the pool
    pub request_pool_size: usize,

    /// Largest push body accepted, in bytes
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            token: env::var("WECHAT_TOKEN").unwrap_or_default(),

            port: parse_var("PORT", 8080),

            webhook_path: parse_path("WEBHOOK_PATH", "/wechat"),

            request_pool_size: parse_var("REQUEST_POOL_SIZE", DEFAULT_POOL_SIZE),

            max_body_bytes: parse_var("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
        }
    }
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Read a route path, ensuring a leading slash.
///
/// A path that collides with [`HEALTH_PATH`] falls back to `default`.
fn parse_path(name: &str, default: &str) -> String {
    let raw = match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return default.to_string(),
    };

    let path = if raw.starts_with('/') {
        raw
    } else {
        format!("/{}", raw)
    };

    if path == HEALTH_PATH {
        warn!(env_var = name, value = %path, "Path reserved for health check, using default");
        return default.to_string();
    }
    path
}
