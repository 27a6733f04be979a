use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

/// Coarse classification of an [`Error`], used by callers that need to pick
/// a response status or decide whether a failure aborts a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Config,
    NotFound,
    Unavailable,
    Inference,
    Store,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Config(_) => ErrorKind::Config,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Unavailable(_) => ErrorKind::Unavailable,
            Error::Inference(_) => ErrorKind::Inference,
            Error::Store(_) => ErrorKind::Store,
            Error::Io(_) | Error::Serialization(_) | Error::Http(_) | Error::External(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn inference(err: impl std::fmt::Display) -> Self {
        Error::Inference(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
