//! Configuration loading and representation.
//!
//! Everything comes from environment variables; unset variables fall back to
//! development defaults, malformed ones are errors.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use storefront_orders::TransitionPolicy;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3002";
pub const DEFAULT_CATALOG_URL: &str = "http://localhost:3001";
pub const DEFAULT_CATALOG_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Runtime configuration of the order service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdersConfig {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory order store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub catalog_url: String,
    pub catalog_timeout: Duration,
    pub transition_policy: TransitionPolicy,
}

impl OrdersConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", &bind_addr, e))?;

        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            None => DEFAULT_DB_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(0) => return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", &raw, "must be at least 1")),
                Ok(n) => n,
                Err(e) => return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", &raw, e)),
            },
        };

        let catalog_timeout_ms = match var("CATALOG_TIMEOUT_MS") {
            None => DEFAULT_CATALOG_TIMEOUT_MS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => return Err(ConfigError::invalid("CATALOG_TIMEOUT_MS", &raw, "must be positive")),
                Ok(ms) => ms,
                Err(e) => return Err(ConfigError::invalid("CATALOG_TIMEOUT_MS", &raw, e)),
            },
        };

        let transition_policy = match var("STRICT_STATUS_TRANSITIONS") {
            None => TransitionPolicy::Lenient,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => TransitionPolicy::Strict,
                "0" | "false" | "no" | "off" => TransitionPolicy::Lenient,
                _ => {
                    return Err(ConfigError::invalid(
                        "STRICT_STATUS_TRANSITIONS",
                        &raw,
                        "expected true or false",
                    ));
                }
            },
        };

        let catalog_url = var("CATALOG_URL").unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());
        if !(catalog_url.starts_with("http://") || catalog_url.starts_with("https://")) {
            return Err(ConfigError::invalid("CATALOG_URL", &catalog_url, "must be an http(s) URL"));
        }

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            db_max_connections,
            catalog_url,
            catalog_timeout: Duration::from_millis(catalog_timeout_ms),
            transition_policy,
        })
    }
}
