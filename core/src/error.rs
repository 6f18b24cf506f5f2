use thiserror::Error;

/// Failure kinds surfaced by a contact sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync cannot run with the current plugin parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A read or write against the underlying store failed.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// The contact failed its business rules before being written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The contact could not be written.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl SyncError {
    /// Short machine-friendly name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::DataAccess(_) => "data_access",
            Self::Validation(_) => "validation",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::DataAccess(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
