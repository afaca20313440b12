use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("{0}")]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    SQLError(#[from] sqlx::Error),
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("invalid candidate {host}:{port}: {reason}")]
    InvalidCandidate {
        host: String,
        port: u16,
        reason: &'static str,
    },
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),
    #[error("invalid table name `{0}`: use ASCII letters, digits and underscores, not starting with a digit")]
    InvalidTableName(String),
    #[error("source {name} responded with HTTP {status}")]
    SourceStatus { name: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, HarvestError>;
