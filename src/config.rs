use std::str::FromStr;
use std::time::Duration;

use crate::gateways::XenditConfig;
use crate::utils::RetryConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Read from the environment, with a `.env` file loaded first if present.
//
//   DATABASE_URL              Postgres URL; unset runs on the in-memory store
//   DATABASE_MAX_CONNECTIONS  pool size (default 10)
//   METRICS_PORT              /metrics and /health (default 9090)
//   XENDIT_SECRET_KEY         unset uses the sandbox gateway
//   XENDIT_BASE_URL           default https://api.xendit.co
//   XENDIT_TIMEOUT_SECS       per-request timeout (default 10)
//   RESTOCK_ON_CANCEL         return stock on cancel/reject (default false)
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: {value}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Behavior switches for the order command handler.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderServiceConfig {
    pub restock_on_cancel: bool,
    /// Backoff for provider status checks in refresh_payment.
    pub status_check_retry: RetryConfig,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            restock_on_cancel: false,
            status_check_retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub metrics_port: u16,
    pub xendit: Option<XenditConfig>,
    pub orders: OrderServiceConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let xendit = match var("XENDIT_SECRET_KEY") {
            Some(secret_key) => Some(XenditConfig {
                secret_key,
                base_url: var("XENDIT_BASE_URL").unwrap_or_else(|| "https://api.xendit.co".into()),
                timeout: Duration::from_secs(parse_or(&var, "XENDIT_TIMEOUT_SECS", 10)?),
            }),
            None => None,
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            metrics_port: parse_or(&var, "METRICS_PORT", 9090)?,
            xendit,
            orders: OrderServiceConfig {
                restock_on_cancel: parse_or(&var, "RESTOCK_ON_CANCEL", false)?,
                status_check_retry: RetryConfig::default(),
            },
        })
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError { name, value }),
        None => Ok(default),
    }
}
