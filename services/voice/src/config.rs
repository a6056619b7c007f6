use nargis_realtime::ReconnectPolicy;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub ws_url: String,
    pub auth_token: Option<SecretString>,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
    pub open_timeout: Duration,
    pub log_level: Level,
}

fn check_ws_url(source: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(
            source.to_string(),
            format!("'{}' is not a ws:// or wss:// URL", url),
        ))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // Unset falls back to the local default; set but blank is a mistake.
        let ws_url = match std::env::var("REALTIME_WS_URL") {
            Ok(url) if url.trim().is_empty() => {
                return Err(ConfigError::MissingVar("REALTIME_WS_URL".to_string()));
            }
            Ok(url) => url.trim().to_string(),
            Err(_) => "ws://localhost:8080/ws".to_string(),
        };
        check_ws_url("REALTIME_WS_URL", &ws_url)?;

        let auth_token = std::env::var("REALTIME_AUTH_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);

        let max_retries = parse_var("REALTIME_MAX_RETRIES", 6u32)?;
        let base_delay = Duration::from_millis(parse_var("REALTIME_BASE_DELAY_MS", 500u64)?);
        let max_delay = Duration::from_millis(parse_var("REALTIME_MAX_DELAY_MS", 30_000u64)?);
        if max_delay < base_delay {
            return Err(ConfigError::InvalidValue(
                "REALTIME_MAX_DELAY_MS".to_string(),
                "must not be smaller than REALTIME_BASE_DELAY_MS".to_string(),
            ));
        }

        let jitter = parse_var("REALTIME_JITTER", 0.2f64)?;
        if !(0.0..=1.0).contains(&jitter) {
            return Err(ConfigError::InvalidValue(
                "REALTIME_JITTER".to_string(),
                format!("{} is outside 0..=1", jitter),
            ));
        }

        let open_timeout = Duration::from_millis(parse_var("REALTIME_OPEN_TIMEOUT_MS", 4_000u64)?);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            ws_url,
            auth_token,
            max_retries,
            base_delay,
            max_delay,
            jitter,
            open_timeout,
            log_level,
        })
    }

    /// Overrides the URL from the environment, with the same checks.
    pub fn set_ws_url(&mut self, url: &str) -> Result<(), ConfigError> {
        let url = url.trim();
        check_ws_url("--url", url)?;
        self.ws_url = url.to_string();
        Ok(())
    }

    /// The URL to connect to, with the auth token appended as a `token`
    /// query parameter when one is configured.
    pub fn connect_url(&self) -> String {
        match &self.auth_token {
            Some(token) => {
                let separator = if self.ws_url.contains('?') { '&' } else { '?' };
                format!(
                    "{}{}token={}",
                    self.ws_url,
                    separator,
                    urlencoding::encode(token.expose_secret())
                )
            }
            None => self.ws_url.clone(),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.base_delay, self.max_delay).with_jitter(self.jitter)
    }
}
