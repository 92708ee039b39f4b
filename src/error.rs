use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a [`TravelError`], safe to hand to any front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Capacity,
    Conflict,
    Authorization,
    Configuration,
    Internal,
}

#[derive(Error, Debug)]
pub enum TravelError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0} not found")]
    NotFoundError(&'static str),
    #[error("{0}")]
    CapacityError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
}

impl TravelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::CsvError(_) => ErrorKind::Validation,
            Self::NotFoundError(_) => ErrorKind::NotFound,
            Self::CapacityError(_) => ErrorKind::Capacity,
            Self::ConflictError(_) => ErrorKind::Conflict,
            Self::AuthorizationError(_) => ErrorKind::Authorization,
            Self::ConfigurationError(_) => ErrorKind::Configuration,
            Self::InternalError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorKind::Internal
            }
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDBError(_) => ErrorKind::Internal,
        }
    }

    /// Storage failures and lost optimistic-concurrency races may succeed on a
    /// later attempt. Payment and confirmation are idempotent and safe to retry;
    /// retrying a failed `create_booking` may reserve seats twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Internal | ErrorKind::Conflict)
    }

    /// Message intended for end users. Internal failures are collapsed into a
    /// generic text so storage details never leak past the core.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal Server Error".to_string(),
            _ => self.to_string(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(message.into())))
    }
}

pub type Result<T> = std::result::Result<T, TravelError>;
