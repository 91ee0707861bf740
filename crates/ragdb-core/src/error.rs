use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Schema mismatch for '{collection}': expected embedding size {expected}, got {actual}")]
    SchemaMismatch { collection: String, expected: usize, actual: usize },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transient provider failure; safe to retry.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider refused the request; retrying will not help.
    #[error("Provider rejected request: {0}")]
    ProviderRejected(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Storage error: {0}")]
    Storage(#[source] BoxError),
}

impl Error {
    /// Wrap a backend failure (LanceDB, Arrow, Tantivy, IO).
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Storage(err.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Timeout(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::storage(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
