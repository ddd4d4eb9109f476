//! WebSocket error types

use thiserror::Error;

/// WebSocket errors
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to encode server message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Malformed client message: {0}")]
    InvalidMessage(String),
}

pub type WsResult<T> = Result<T, WsError>;
