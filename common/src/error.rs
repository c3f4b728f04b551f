// Error types for the tickrelay services
use crate::types::ClientId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("WebSocket send error: {0}")]
    AxumError(#[from] axum::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Upstream feed is not connected")]
    NotConnected,

    #[error("Upstream feed has been shut down")]
    ShutDown,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    #[error("Failed to deliver message to client {0}")]
    ClientSendFailed(ClientId),
}

pub type Result<T> = std::result::Result<T, RelayError>;
