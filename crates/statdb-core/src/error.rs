use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Artifact '{name}' unavailable: {reason}")]
    Artifact { name: String, reason: String },

    #[error("Row alignment violated: {0}")]
    Alignment(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn artifact(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Artifact { name: name.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
