use thiserror::Error;

/// Errors that can occur when using the HobbyMate realtime client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication or session error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error (REST collaborators)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Attempted operation while no socket is open
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;
