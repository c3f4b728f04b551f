// Configuration management for the relay
use crate::{RelayError, Result};
use std::time::Duration;

pub const DEFAULT_FEED_WS_URL: &str = "wss://ws.finnhub.io";

/// Upstream feed settings. The reconnect delay starts at `reconnect_base`,
/// doubles after every failed attempt and is capped at `reconnect_max`.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub ws_url: String,
    pub token: String,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
}

impl FeedConfig {
    /// Full dial URL with the API token appended as a query parameter.
    pub fn endpoint(&self) -> String {
        format!("{}?token={}", self.ws_url, self.token)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_FEED_WS_URL.to_string(),
            token: String::new(),
            reconnect_base: Duration::from_secs(5),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub feed: FeedConfig,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source so tests never
    /// have to mutate the process environment. The API token is the only
    /// required variable; everything else falls back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("FINNHUB_API_KEY")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::ConfigError("FINNHUB_API_KEY is not set".to_string()))?;

        let feed = FeedConfig {
            ws_url: lookup("FINNHUB_WS_URL").unwrap_or_else(|| DEFAULT_FEED_WS_URL.to_string()),
            token,
            reconnect_base: Duration::from_secs(
                lookup("RECONNECT_BASE_SECS")
                    .unwrap_or_else(|| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            ),
            reconnect_max: Duration::from_secs(
                lookup("RECONNECT_MAX_SECS")
                    .unwrap_or_else(|| "60".to_string())
                    .parse()
                    .unwrap_or(60),
            ),
        };

        let allowed_origins = lookup("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            feed,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            allowed_origins,
        })
    }
}
