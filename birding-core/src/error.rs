//! Error types for shelves and their backends.

use thiserror::Error;

/// Boxed transport error carried by [`ShelfError::BackendUnavailable`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by every [`Shelf`](crate::Shelf) operation.
///
/// `NotFound` is deliberately overloaded: a key that was never set, was
/// deleted, was evicted, has expired, or was stored in a shape that cannot be
/// read back all surface as the same signal.
#[derive(Error, Debug)]
pub enum ShelfError {
    /// The key is absent (or indistinguishable from absent)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The storage backend could not be reached
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] BoxError),

    /// Unknown backend kind or invalid init parameters
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ShelfError {
    /// Creates a `NotFound` error for the given key.
    pub fn not_found(key: impl Into<String>) -> Self {
        ShelfError::NotFound(key.into())
    }

    /// Creates a `Configuration` error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        ShelfError::Configuration(msg.into())
    }

    /// Returns `true` if this error means the key is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShelfError::NotFound(_))
    }
}

/// Errors returned by a [`DocumentIndex`](crate::DocumentIndex) client.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The document (or the whole index) does not exist
    #[error("Document not found")]
    NotFound,

    /// Transport failure or unexpected response from the index
    #[error("Index unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

impl IndexError {
    /// Wraps any error as `Unavailable`.
    pub fn unavailable<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        IndexError::Unavailable(err.into())
    }

    /// Maps this error onto the shelf taxonomy for the given key.
    pub(crate) fn into_shelf_error(self, key: &str) -> ShelfError {
        match self {
            IndexError::NotFound => ShelfError::not_found(key),
            IndexError::Unavailable(source) => ShelfError::BackendUnavailable(source),
        }
    }
}
