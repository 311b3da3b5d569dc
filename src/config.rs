// Application configuration

use chronicle_events::EventBusConfig;
use chronicle_eventsourcing::EventStoreConfig;
use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Prefix of every environment variable read by [`ApplicationConfig::from_env`]
pub const ENV_PREFIX: &str = "CHRONICLE";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse configuration key {key}: {reason}")]
    ParseError { key: String, reason: String },

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration of an [`Application`](crate::Application)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub bus: EventBusConfig,
    pub store: EventStoreConfig,
}

impl ApplicationConfig {
    /// Load from `CHRONICLE_*` environment variables
    ///
    /// - `CHRONICLE_LOG_EVENTS`: bus and store logging (`true`/`false`)
    /// - `CHRONICLE_WARN_UNHANDLED`: warn on events nobody handles
    /// - `CHRONICLE_PAGE_SIZE`: replay in pages of this many events
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::vars())
    }

    /// Load from an iterator of `(key, value)` pairs
    ///
    /// Keys without the `CHRONICLE_` prefix are ignored, as are unknown keys.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            let Some(name) = key
                .as_ref()
                .strip_prefix(ENV_PREFIX)
                .and_then(|rest| rest.strip_prefix('_'))
            else {
                continue;
            };
            let value = value.as_ref().trim();

            match name {
                "LOG_EVENTS" => {
                    let enabled = parse_bool(key.as_ref(), value)?;
                    config.bus.enable_logging = enabled;
                    config.store.enable_logging = enabled;
                }
                "WARN_UNHANDLED" => {
                    config.bus.warn_unhandled = parse_bool(key.as_ref(), value)?;
                }
                "PAGE_SIZE" => {
                    config.store.page_size = parse_page_size(key.as_ref(), value)?;
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Load from a JSON document
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ParseError {
            key: key.to_string(),
            reason: format!("expected a boolean, got {:?}", value),
        }),
    }
}

/// Empty or zero disables paging
fn parse_page_size(key: &str, value: &str) -> Result<Option<usize>> {
    if value.is_empty() {
        return Ok(None);
    }
    let size: usize = value.parse().map_err(|e| ConfigError::ParseError {
        key: key.to_string(),
        reason: format!("{}", e),
    })?;
    Ok((size > 0).then_some(size))
}
