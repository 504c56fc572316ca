use thiserror::Error;

#[derive(Error, Debug)]
pub enum CouncilError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Council API error {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Response has no body to stream")]
    MissingBody,

    #[error("Frame exceeds {limit} bytes without a delimiter")]
    FrameTooLarge { limit: usize },

    #[error("Stream task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<reqwest::Error> for CouncilError {
    fn from(e: reqwest::Error) -> Self {
        CouncilError::TransportError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CouncilError>;
