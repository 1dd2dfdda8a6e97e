use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const API_KEY_HEADER: &str = "x-fajsapi-key";
pub const SESSION_HEADER: &str = "cookies";
pub const GUEST_HEADER: &str = "x-fa-guest";

pub const DEFAULT_API_KEY: &str = "fajs_local_dev";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPSTREAM_BASE: &str = "http://localhost:8081";
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Process-wide settings, read once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub port: u16,
    pub upstream_base: String,
    pub upstream_timeout: Duration,
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            port: DEFAULT_PORT,
            upstream_base: DEFAULT_UPSTREAM_BASE.to_string(),
            upstream_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            log_level: "info".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    ///
    /// - `FAJSAPI_KEY`: API secret (empty or unset uses the built-in default)
    /// - `API_PORT`: listen port (default 3000)
    /// - `UPSTREAM_BASE`: content backend base URL, plain `http://` only
    /// - `UPSTREAM_TIMEOUT_SECS`: upstream call timeout (default 30)
    /// - `LOG_LEVEL`: tracing filter (default "info")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("FAJSAPI_KEY")
            .filter(|key| !key.is_empty())
            .unwrap_or(defaults.api_key);

        let port = match lookup("API_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "API_PORT".to_string(),
                reason: format!("not a port number: {raw:?}"),
            })?,
            None => defaults.port,
        };

        let upstream_base = lookup("UPSTREAM_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty())
            .unwrap_or(defaults.upstream_base);
        if !upstream_base.starts_with("http://") {
            return Err(ConfigError::InvalidValue {
                name: "UPSTREAM_BASE".to_string(),
                reason: format!("only plain http upstreams are supported: {upstream_base:?}"),
            });
        }

        let upstream_timeout = match lookup("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue {
                    name: "UPSTREAM_TIMEOUT_SECS".to_string(),
                    reason: format!("not a number of seconds: {raw:?}"),
                })?,
            None => defaults.upstream_timeout,
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            api_key,
            port,
            upstream_base,
            upstream_timeout,
            log_level,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}
