// Server configuration from the environment (optionally via `.env`)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

use crate::scheduler::SchedulerConfig;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::Pretty }
    }
}

impl LoggingConfig {
    /// Install the global subscriber. `RUST_LOG` wins over `level`.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format {
            LogFormat::Json => fmt().json().with_env_filter(filter).init(),
            LogFormat::Pretty => fmt().with_env_filter(filter).init(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// sled directory; in-memory storage when unset
    pub data_dir: Option<PathBuf>,
    pub initial_balance: f64,
    pub seed_markets: bool,
    /// chain relay base URL; mock mode when unset
    pub relay_url: Option<String>,
    /// CoinGecko-compatible API; template markets only when unset
    pub price_feed_url: Option<String>,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            data_dir: None,
            initial_balance: 1000.0,
            seed_markets: true,
            relay_url: None,
            price_feed_url: None,
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let initial_balance = parse_or(get("INITIAL_BALANCE"), "INITIAL_BALANCE", defaults.initial_balance)?;
        if !initial_balance.is_finite() || initial_balance < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "INITIAL_BALANCE",
                reason: "must be a non-negative number".into(),
            });
        }

        let seed_markets = match get("SEED_MARKETS") {
            None => defaults.seed_markets,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                field: "SEED_MARKETS",
                reason: format!("expected true or false, got '{}'", raw),
            })?,
        };

        let format = match get("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "LOG_FORMAT",
                    reason: format!("expected pretty or json, got '{}'", other),
                })
            }
        };

        Ok(Self {
            bind_addr: parse_or(get("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr)?,
            data_dir: get("DATA_DIR").map(PathBuf::from),
            initial_balance,
            seed_markets,
            relay_url: get("RELAY_URL"),
            price_feed_url: get("PRICE_FEED_URL"),
            scheduler: SchedulerConfig {
                create_interval: interval(get("CREATE_INTERVAL_SECS"), "CREATE_INTERVAL_SECS", defaults.scheduler.create_interval)?,
                resolve_interval: interval(get("RESOLVE_INTERVAL_SECS"), "RESOLVE_INTERVAL_SECS", defaults.scheduler.resolve_interval)?,
            },
            logging: LoggingConfig {
                level: get("LOG_LEVEL").unwrap_or(defaults.logging.level),
                format,
            },
        })
    }
}

fn parse_or<T>(raw: Option<String>, field: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue { field, reason: e.to_string() }),
    }
}

fn interval(raw: Option<String>, field: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(raw, field, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue { field, reason: "must be at least 1 second".into() });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
