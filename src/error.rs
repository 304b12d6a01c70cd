use thiserror::Error;

use crate::driver::BackendError;

/// Canonical error type for every database, collection and query operation.
///
/// Backend-specific sentinels never leave the crate: `From<BackendError>`
/// folds every backend "no documents matched" condition into
/// [`OrmError::NotFound`] and wraps everything else in [`OrmError::Backend`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrmError {
    /// No document matched the lookup or removal filter.
    ///
    /// Recoverable; callers typically fall back to creating a new record.
    #[error("not found")]
    NotFound,

    /// The operation ran before `Database::connect` succeeded.
    #[error("not connected to database")]
    NotConnected,

    /// The connection string names a scheme no driver is registered for.
    #[error("unsupported database scheme '{0}'")]
    UnsupportedScheme(String),

    /// The connection string could not be parsed or names no database.
    #[error("invalid database url: {0}")]
    InvalidUrl(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// A record could not be converted to or from a document.
    #[error("record serialization error: {0}")]
    Serde(String),

    /// Any other backend failure, passed through unchanged.
    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl OrmError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrmError::NotFound)
    }
}

impl From<BackendError> for OrmError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound => OrmError::NotFound,
            other => OrmError::Backend(other),
        }
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serde(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;
