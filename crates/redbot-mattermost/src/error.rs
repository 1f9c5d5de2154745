// ABOUTME: Error types for redbot-mattermost.
// ABOUTME: Defines BridgeError covering config, connect, listen, decode, lookup and post failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The chat transport could not be established.
    #[error("Connect error: {0}")]
    Connect(String),

    /// The chat transport failed while listening.
    #[error("Listen error: {0}")]
    Listen(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Issue lookup error: {0}")]
    Lookup(#[from] redbot_redmine::RedmineError),

    #[error("Mattermost API error: {status} {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
