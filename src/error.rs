use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Throttle is closed: shutdown has begun")]
    Closed,

    #[error("Submission rejected: queue depth limit {0} reached")]
    Rejected(usize),

    #[error("Request cancelled before completion")]
    Cancelled,

    #[error("Initialization error: {0}")]
    Init(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
