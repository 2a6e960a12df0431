//! Server configuration, read from the environment at startup.

use std::time::Duration;

use crate::error::{Error, Result};

/// Service name reported by `GET /`.
pub const SERVICE_NAME: &str = "AI vs Real";

/// Default upload cap: 12 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default comma-separated CORS allow-list.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Default rate-limit window: 15 minutes.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default `RUST_LOG` filter when the variable is unset.
pub const DEFAULT_LOG_FILTER: &str = "ai_vs_real=info,tower_http=info";

/// Explicit configuration for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Origins allowed to make cross-origin requests.
    pub allowed_origins: Vec<String>,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
    /// Requests allowed per client per window; 0 disables rate limiting.
    pub rate_limit_max: u32,
    /// Length of the rate-limit window.
    pub rate_limit_window: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            rate_limit_max: 0,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

impl ServerConfig {
    /// Build a configuration from `HOST`, `PORT`, `ALLOWED_ORIGINS`,
    /// `MAX_UPLOAD_BYTES`, `RATE_LIMIT_MAX` and `RATE_LIMIT_WINDOW_MS`, falling
    /// back to defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a numeric variable is not a valid
    /// number, or if `RATE_LIMIT_WINDOW_MS` is 0.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_number("PORT", &port)?;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = parse_origins(&origins);
        }
        if let Some(max) = lookup("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", &max)?;
        }
        if let Some(max) = lookup("RATE_LIMIT_MAX") {
            config.rate_limit_max = parse_number("RATE_LIMIT_MAX", &max)?;
        }
        if let Some(raw) = lookup("RATE_LIMIT_WINDOW_MS") {
            let ms: u64 = parse_number("RATE_LIMIT_WINDOW_MS", &raw)?;
            if ms == 0 {
                return Err(Error::InvalidConfig {
                    key: "RATE_LIMIT_WINDOW_MS",
                    value: raw,
                });
            }
            config.rate_limit_window = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// `host:port` string suitable for binding a listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated origin list, trimming whitespace and dropping
/// empty entries.
#[must_use]
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| Error::InvalidConfig {
        key,
        value: raw.to_string(),
    })
}
