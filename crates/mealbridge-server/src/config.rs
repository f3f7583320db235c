//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit SQLite database path. When unset the platform data
    /// directory is used.
    /// Env: `DB_PATH`
    /// Default: unset
    pub db_path: Option<PathBuf>,

    /// Seconds between expiry-reaper cycles.
    /// Env: `REAPER_INTERVAL_SECS`
    /// Default: `60`
    pub reaper_interval_secs: u64,

    /// Listing size when the caller does not pass `limit`.
    /// Env: `DEFAULT_LIST_LIMIT`
    /// Default: `20`
    pub default_list_limit: usize,

    /// Hard cap on listing size whatever the caller asks for.
    /// Env: `MAX_LIST_LIMIT`
    /// Default: `100`
    pub max_list_limit: usize,

    /// Sustained claim attempts per second allowed per rescuer.
    /// Env: `CLAIM_RATE`
    /// Default: `1.0`
    pub claim_rate: f64,

    /// Claim attempt burst size per rescuer.
    /// Env: `CLAIM_BURST`
    /// Default: `5.0`
    pub claim_burst: f64,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"MealBridge Node"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            db_path: None,
            reaper_interval_secs: 60,
            default_list_limit: 20,
            max_list_limit: 100,
            claim_rate: 1.0,
            claim_burst: 5.0,
            instance_name: "MealBridge Node".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(val) = std::env::var("REAPER_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.reaper_interval_secs = secs,
                _ => tracing::warn!(value = %val, "Invalid REAPER_INTERVAL_SECS, using default"),
            }
        }

        if let Ok(val) = std::env::var("DEFAULT_LIST_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.default_list_limit = n,
                _ => tracing::warn!(value = %val, "Invalid DEFAULT_LIST_LIMIT, using default"),
            }
        }

        if let Ok(val) = std::env::var("MAX_LIST_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_list_limit = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_LIST_LIMIT, using default"),
            }
        }

        if let Ok(val) = std::env::var("CLAIM_RATE") {
            match val.parse::<f64>() {
                Ok(rate) if rate > 0.0 => config.claim_rate = rate,
                _ => tracing::warn!(value = %val, "Invalid CLAIM_RATE, using default"),
            }
        }

        if let Ok(val) = std::env::var("CLAIM_BURST") {
            match val.parse::<f64>() {
                Ok(burst) if burst >= 1.0 => config.claim_burst = burst,
                _ => tracing::warn!(value = %val, "Invalid CLAIM_BURST, using default"),
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            if !name.is_empty() {
                config.instance_name = name;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Clamp a caller-supplied listing limit to the configured bounds.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_list_limit)
            .min(self.max_list_limit)
            .max(1)
    }
}
