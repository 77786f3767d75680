use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
/// Path of the probe function served by this binary.
pub const PROBE_PATH: &str = "/api/v1/probe";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid PGTESTER_BIND_ADDRESS '{value}': {source}")]
    InvalidBindAddress {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("Invalid PGTESTER_API_URL '{value}': {source}")]
    InvalidApiUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("Invalid PGTESTER_REQUEST_TIMEOUT_SECS '{0}': expected a positive number of seconds")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Base URL the dashboard sends `?path=<endpoint>` requests to.
    pub api_url: Url,
    pub request_timeout: Duration,
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_value =
            var("PGTESTER_BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address: SocketAddr =
            bind_value
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddress {
                    value: bind_value.clone(),
                    source,
                })?;

        let api_url = match var("PGTESTER_API_URL") {
            Some(value) => Url::parse(&value)
                .map_err(|source| ConfigError::InvalidApiUrl { value, source })?,
            None => local_probe_url(bind_address),
        };

        let request_timeout = match var("PGTESTER_REQUEST_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(value)),
            },
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Config {
            bind_address,
            api_url,
            request_timeout,
            database_url: var("DATABASE_URL"),
        })
    }
}

/// Probe URL on this service as reached from the same host.
fn local_probe_url(bind_address: SocketAddr) -> Url {
    let host = if bind_address.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else if bind_address.is_ipv6() {
        format!("[{}]", bind_address.ip())
    } else {
        bind_address.ip().to_string()
    };
    let raw = format!("http://{host}:{}{PROBE_PATH}", bind_address.port());
    Url::parse(&raw).expect("socket address always forms a valid URL")
}
