use birding_core::{IndexError, ShelfError};
use thiserror::Error;

use crate::search::SearchError;

/// Errors raised while processing one stream element.
///
/// None of these stop the pipeline; the element is logged and dropped.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A term or status id cannot be used as a shelf key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The stage's shelf failed
    #[error(transparent)]
    Shelf(#[from] ShelfError),

    /// Search or lookup failed
    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    /// Writing a published status failed
    #[error("Publish failed: {0}")]
    Io(#[from] std::io::Error),

    /// A status could not be encoded
    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Indexing a published status failed
    #[error("Indexing failed: {0}")]
    Index(#[from] IndexError),
}
