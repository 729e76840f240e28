//! Error types for the synchronization pipeline

use std::time::Duration;
use thiserror::Error;

/// Failures of the streamed validation channel.
///
/// These never reach the edit path: the connection driver logs them and
/// schedules a reconnect.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Channel closed")]
    Closed,

    #[error("Handshake did not complete within {0:?}")]
    ConnectTimeout(Duration),
}

/// Failures of a request/response derivation call (preview or export)
#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("Service error ({status}): {detail}")]
    Service { status: u16, detail: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unsupported origin scheme: {0}")]
    Scheme(String),
}
