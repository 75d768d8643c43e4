//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use messaging::CommandBusConfig;
use saga::SagaConfig;

/// The user orders are placed for when the request names none.
pub const DEFAULT_USER_ID: &str = "27b95829-4f3f-4ddf-8983-151ba010e35b";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `PAYMENT_DEADLINE_SECS`: payment timeout (default: `120`)
/// - `COMMAND_TIMEOUT_MS`: command dispatch timeout (default: `5000`)
/// - `ORDER_RESPONSE_TIMEOUT_MS`: how long `POST /orders` waits (default: `10000`)
/// - `BUS_PARTITIONS` / `SAGA_PARTITIONS`: worker counts (default: `8`)
/// - `DEFAULT_USER_ID`: user for orders that name none
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub payment_deadline: Duration,
    pub command_timeout: Duration,
    pub order_response_timeout: Duration,
    pub bus_partitions: usize,
    pub saga_partitions: usize,
    pub default_user_id: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            payment_deadline: parse_var(&lookup, "PAYMENT_DEADLINE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.payment_deadline),
            command_timeout: parse_var(&lookup, "COMMAND_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.command_timeout),
            order_response_timeout: parse_var(&lookup, "ORDER_RESPONSE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.order_response_timeout),
            bus_partitions: parse_var(&lookup, "BUS_PARTITIONS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.bus_partitions),
            saga_partitions: parse_var(&lookup, "SAGA_PARTITIONS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.saga_partitions),
            default_user_id: lookup("DEFAULT_USER_ID")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_user_id),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bus_config(&self) -> CommandBusConfig {
        CommandBusConfig {
            partitions: self.bus_partitions,
            dispatch_timeout: self.command_timeout,
            ..CommandBusConfig::default()
        }
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            partitions: self.saga_partitions,
            payment_deadline: self.payment_deadline,
            ..SagaConfig::default()
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            payment_deadline: Duration::from_secs(120),
            command_timeout: Duration::from_millis(5000),
            order_response_timeout: Duration::from_millis(10_000),
            bus_partitions: 8,
            saga_partitions: 8,
            default_user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}
