//! Error taxonomy shared by the library.
//!
//! Settings and dataset errors are fatal at startup. Provider errors are
//! recoverable: callers degrade ML features instead of aborting.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider could not be contacted at all (connection refused, timeout)
    #[error("embedding provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("failed to load embedding model: {0}")]
    ModelLoadError(String),

    #[error("failed to load dataset: {0}")]
    DatasetLoadError(String),

    #[error("invalid settings: {0}")]
    ConfigParseError(String),

    #[error("ML features are disabled (ml_enabled = false)")]
    MlDisabled,

    #[error("embedding cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors after which the rest of the application can keep running
    /// with ML features switched off.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_)
                | Error::ProviderUnreachable(_)
                | Error::ModelLoadError(_)
                | Error::MlDisabled
        )
    }

    /// Connection-level failure: retrying other inputs will not help
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::ProviderUnreachable(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Error::ProviderUnreachable(e.to_string())
        } else {
            Error::ProviderUnavailable(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
