use thiserror::Error;

/// Top-level error type used across the entire application.
#[derive(Debug, Error)]
pub enum RssiError {
    #[error("config error: {0}")]
    Config(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T, E = RssiError> = std::result::Result<T, E>;
