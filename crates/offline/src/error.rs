use thiserror::Error;

pub type Result<T> = std::result::Result<T, OfflineError>;

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
