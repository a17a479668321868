//! Process-start configuration read from the environment.

use crate::constants::{credentials, network};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("{key} is not a valid http(s) URL: {value}")]
    InvalidUrl { key: String, value: String },

    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: String, value: String },
}

/// Long-lived material for the refresh-token exchange.
#[derive(Clone)]
pub struct RefreshSecret {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshSecret")
            .field("client_id", &"[REDACTED]")
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub secret: RefreshSecret,
    pub lastfm_api_key: Option<String>,
    pub spotify_api_url: Url,
    pub token_url: Url,
    pub lastfm_api_url: Url,
    pub bind: String,
    pub request_timeout: Duration,
    pub expiry_margin: Duration,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("secret", &self.secret)
            .field("lastfm_api_key", &self.lastfm_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("spotify_api_url", &self.spotify_api_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("lastfm_api_url", &self.lastfm_api_url.as_str())
            .field("bind", &self.bind)
            .field("request_timeout", &self.request_timeout)
            .field("expiry_margin", &self.expiry_margin)
            .finish()
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut required = |key: &str| {
            let value = read(key);
            if value.is_none() {
                missing.push(key.to_string());
            }
            value.unwrap_or_default()
        };
        let client_id = required("CLIENT_ID");
        let client_secret = required("CLIENT_SECRET");
        let refresh_token = required("REFRESH_TOKEN");
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let url_or = |key: &str, fallback: &str| -> Result<Url, ConfigError> {
            let raw = read(key).unwrap_or_else(|| fallback.to_string());
            parse_http_url(key, &raw)
        };
        let millis_or = |key: &str, fallback: u64| -> Result<Duration, ConfigError> {
            match read(key) {
                None => Ok(Duration::from_millis(fallback)),
                Some(raw) => raw
                    .parse::<u64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .map(Duration::from_millis)
                    .ok_or(ConfigError::InvalidNumber {
                        key: key.to_string(),
                        value: raw,
                    }),
            }
        };

        Ok(Self {
            secret: RefreshSecret {
                client_id,
                client_secret,
                refresh_token,
            },
            lastfm_api_key: read("LASTFM_API_KEY"),
            spotify_api_url: url_or("SPOTIFY_API_URL", network::SPOTIFY_API_URL)?,
            token_url: url_or("SPOTIFY_TOKEN_URL", network::SPOTIFY_TOKEN_URL)?,
            lastfm_api_url: url_or("LASTFM_API_URL", network::LASTFM_API_URL)?,
            bind: read("MCP_BIND").unwrap_or_else(|| network::DEFAULT_BIND.to_string()),
            request_timeout: millis_or(
                "SPOTIFY_MCP_TIMEOUT_MS",
                network::TIMEOUT_UPSTREAM_REQUEST_MS,
            )?,
            expiry_margin: millis_or(
                "SPOTIFY_MCP_TOKEN_MARGIN_MS",
                credentials::EXPIRY_MARGIN_MS,
            )?,
        })
    }
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        key: key.to_string(),
        value: raw.to_string(),
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(url)
}
