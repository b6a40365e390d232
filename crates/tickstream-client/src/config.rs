/*
[INPUT]:  YAML configuration file, TICKSTREAM_* environment overrides
[OUTPUT]: Validated client configuration
[POS]:    Configuration layer - connection and retry setup
[UPDATE]: When adding new configuration options
*/

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tickstream_adapter::{Result, StreamError};
use url::Url;

use crate::reconnect::{ReconnectionPolicy, RetryLimit};

pub const ENV_PREFIX: &str = "TICKSTREAM";

/// Configuration surface exposed to the host application
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Market data WebSocket URL (ws:// or wss://)
    pub url: String,
    /// Reconnect automatically after abnormal closures
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
    /// Retry limit after an abnormal closure; 0 retries indefinitely
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound (exclusive) of the random delay added to each backoff
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Messages held while offline; 0 keeps everything
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-listener event backlog before a slow listener starts lagging
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Initial interest set
    #[serde(default)]
    pub symbols: Vec<String>,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ms() -> u64 {
    1_000
}

fn default_queue_capacity() -> usize {
    1_024
}

fn default_event_buffer() -> usize {
    1_024
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl ClientConfig {
    /// Configuration with defaults for everything but the URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auto_reconnect: default_auto_reconnect(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            queue_capacity: default_queue_capacity(),
            event_buffer: default_event_buffer(),
            connect_timeout_ms: default_connect_timeout_ms(),
            symbols: Vec::new(),
        }
    }

    /// Load configuration from a YAML file, with TICKSTREAM_* environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Yaml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("symbols"),
            )
            .build()
            .map_err(|err| StreamError::Config(err.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|err| StreamError::Config(err.to_string()))
    }

    /// Parse an inline YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|err| StreamError::Config(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(StreamError::Config(format!(
                "url scheme must be ws or wss, got {}",
                url.scheme()
            )));
        }
        if self.event_buffer == 0 {
            return Err(StreamError::Config(
                "event_buffer must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StreamError::Config(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        self.reconnection_policy().map(|_| ())
    }

    pub fn retry_limit(&self) -> RetryLimit {
        RetryLimit::from_max_attempts(self.max_attempts)
    }

    pub fn reconnection_policy(&self) -> Result<ReconnectionPolicy> {
        ReconnectionPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            Duration::from_millis(self.jitter_ms),
            self.retry_limit(),
        )
    }

    pub fn queue_limit(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
