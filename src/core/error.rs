//! Error handling - One hierarchy for every terminal failure

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// AlephTX socket error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Initial dial failed, or the handle never had a transport
    #[error("Connect error: {0}")]
    Connect(String),

    /// Registering a topic handler failed
    #[error("Registration error: {0}")]
    Registration(String),

    /// Transport-level send failure
    #[error("Send error: {0}")]
    Send(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No reply observed within the deadline
    #[error("Websocket response timeout after {0:?}")]
    Timeout(Duration),

    /// Caller gave up on the request
    #[error("Request cancelled")]
    Cancelled,

    /// WebSocket frame / IO errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Malformed Engine.IO / Socket.IO packet
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation on a closed transport
    #[error("Connection closed")]
    Closed,
}

impl Error {
    /// True for the failures that mean "the request never left".
    pub fn is_send_failure(&self) -> bool {
        matches!(
            self,
            Error::Send(_) | Error::Serialization(_) | Error::Connect(_) | Error::Closed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e.to_string())
    }
}
