//! Error types for the index client.

use birding_core::IndexError;
use reqwest::StatusCode;
use thiserror::Error;

/// Longest response body kept in an error message.
const MAX_BODY_IN_ERROR: usize = 512;

/// Errors that can occur when talking to the document index.
#[derive(Error, Debug)]
pub enum Error {
    /// The configured base URL cannot address documents
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP transport error (connect, timeout, TLS)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The document or index does not exist
    #[error("Not found")]
    NotFound,

    /// The index answered with an unexpected status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the JSON we expected
    #[error("Deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl Error {
    /// Returns `true` if the document or index does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Classifies a non-success response, turning 404 into `NotFound`.
    pub(crate) fn from_status(status: StatusCode, mut body: String) -> Self {
        if status == StatusCode::NOT_FOUND {
            return Error::NotFound;
        }
        if body.len() > MAX_BODY_IN_ERROR {
            let mut end = MAX_BODY_IN_ERROR;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
            body.push_str("...");
        }
        Error::Status {
            status: status.as_u16(),
            body,
        }
    }
}

impl From<Error> for IndexError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound => IndexError::NotFound,
            other => IndexError::unavailable(other),
        }
    }
}
