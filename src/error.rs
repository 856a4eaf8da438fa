use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("API responded with {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("Not connected; message dropped")]
    NotConnected,

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Unknown event: {id}")]
    UnknownEvent { id: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Metrics server error: {0}")]
    MetricsError(String),
}
