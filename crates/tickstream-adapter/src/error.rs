/*
[INPUT]:  Error sources (WebSocket, serialization, URL parsing, configuration, runtime)
[OUTPUT]: Structured error types with retry hints
[POS]:    Error handling layer - unified error types for the workspace
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the tickstream client
#[derive(Error, Debug)]
pub enum StreamError {
    /// WebSocket transport failed
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Symbol is empty after normalization
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// The socket is not open for writing
    #[error("Socket is not open")]
    NotConnected,

    /// Connection timeout
    #[error("Connection timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// No async runtime to drive the connection
    #[error("Tokio runtime unavailable: {0}")]
    Runtime(String),

    /// The connection manager worker has stopped
    #[error("Connection manager is no longer running")]
    ClientClosed,
}

impl StreamError {
    /// Check if the error is a transient connectivity failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::WebSocket(_) | StreamError::NotConnected | StreamError::Timeout { .. }
        )
    }

    /// Check if the error was caused by invalid configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StreamError::Config(_) | StreamError::UrlParse(_) | StreamError::InvalidSymbol(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::WebSocket(value.to_string())
    }
}

/// Result type alias for tickstream operations
pub type Result<T> = std::result::Result<T, StreamError>;
