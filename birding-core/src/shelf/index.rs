//! Durable shelf persisting one document per key in a document index.

use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use super::{InitParams, Shelf};
use crate::error::{IndexError, ShelfError};

/// Default index name and document type for an [`IndexShelf`].
pub const DEFAULT_COLLECTION_NAME: &str = "shelf";

/// Field of the stored document that holds the shelf value.
const VALUE_FIELD: &str = "value";

/// An index name plus document type, addressing where documents live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    pub index: String,
    pub doc_type: String,
}

impl Collection {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
        }
    }

    /// Splits `index` and `doc_type` out of shelf init parameters.
    ///
    /// Both default to `"shelf"`. The remaining parameters are returned for
    /// the index client's own constructor.
    pub fn split_init(init: &InitParams) -> Result<(Self, InitParams), ShelfError> {
        let mut rest = init.clone();
        let index = take_string(&mut rest, "index")?;
        let doc_type = take_string(&mut rest, "doc_type")?;
        let collection = Self::new(
            index.unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            doc_type.unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
        );
        Ok((collection, rest))
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION_NAME, DEFAULT_COLLECTION_NAME)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.doc_type)
    }
}

fn take_string(init: &mut InitParams, field: &str) -> Result<Option<String>, ShelfError> {
    match init.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s)),
        Some(other) => Err(ShelfError::configuration(format!(
            "durable_index init field `{field}` must be a non-empty string, got {other}"
        ))),
    }
}

/// Client boundary for an external searchable document index.
///
/// `get` returns the document body (the stored source), or
/// `IndexError::NotFound`. `index` upserts; with `refresh` set, the write
/// must be visible to the next `get` before the call returns.
pub trait DocumentIndex: Send + Sync {
    fn get(&self, collection: &Collection, id: &str) -> Result<Value, IndexError>;

    fn index(&self, collection: &Collection, id: &str, body: &Value, refresh: bool) -> Result<(), IndexError>;

    fn delete(&self, collection: &Collection, id: &str) -> Result<(), IndexError>;

    /// Drops the whole index named by `index`.
    fn drop_index(&self, index: &str) -> Result<(), IndexError>;
}

impl<I: DocumentIndex + ?Sized> DocumentIndex for Arc<I> {
    fn get(&self, collection: &Collection, id: &str) -> Result<Value, IndexError> {
        (**self).get(collection, id)
    }

    fn index(&self, collection: &Collection, id: &str, body: &Value, refresh: bool) -> Result<(), IndexError> {
        (**self).index(collection, id, body, refresh)
    }

    fn delete(&self, collection: &Collection, id: &str) -> Result<(), IndexError> {
        (**self).delete(collection, id)
    }

    fn drop_index(&self, index: &str) -> Result<(), IndexError> {
        (**self).drop_index(index)
    }
}

impl<I: DocumentIndex + ?Sized> DocumentIndex for Box<I> {
    fn get(&self, collection: &Collection, id: &str) -> Result<Value, IndexError> {
        (**self).get(collection, id)
    }

    fn index(&self, collection: &Collection, id: &str, body: &Value, refresh: bool) -> Result<(), IndexError> {
        (**self).index(collection, id, body, refresh)
    }

    fn delete(&self, collection: &Collection, id: &str) -> Result<(), IndexError> {
        (**self).delete(collection, id)
    }

    fn drop_index(&self, index: &str) -> Result<(), IndexError> {
        (**self).drop_index(index)
    }
}

/// A shelf persisting each entry as the document `{"value": <value>}`.
///
/// Writes force an index refresh, so a `get` right after a `set` from the
/// same process always sees the write. A document that exists but has no
/// `value` field reads as `NotFound`, same as a missing one. Transport
/// failures surface as `BackendUnavailable` and are never retried here.
///
/// # Example
///
/// ```rust
/// use birding_core::{Collection, IndexShelf, MemoryIndex, Shelf};
/// use serde_json::json;
///
/// let shelf = IndexShelf::new(MemoryIndex::new(), Collection::default());
/// shelf.set("pypi", json!("2016-01-01T00:00:00Z")).unwrap();
/// assert_eq!(shelf.get("pypi").unwrap(), json!("2016-01-01T00:00:00Z"));
/// ```
pub struct IndexShelf<I> {
    client: I,
    collection: Collection,
}

impl<I: DocumentIndex> IndexShelf<I> {
    pub fn new(client: I, collection: Collection) -> Self {
        tracing::info!(collection = %collection, "Creating durable index shelf");
        Self { client, collection }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn client(&self) -> &I {
        &self.client
    }
}

impl<I: DocumentIndex> Shelf for IndexShelf<I> {
    fn get(&self, key: &str) -> Result<Value, ShelfError> {
        let mut doc = self
            .client
            .get(&self.collection, key)
            .map_err(|e| e.into_shelf_error(key))?;

        match doc.get_mut(VALUE_FIELD) {
            Some(value) => Ok(value.take()),
            None => Err(ShelfError::not_found(key)),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ShelfError> {
        let body = json!({ VALUE_FIELD: value });
        self.client
            .index(&self.collection, key, &body, true)
            .map_err(|e| e.into_shelf_error(key))
    }

    fn delete(&self, key: &str) -> Result<(), ShelfError> {
        match self.client.delete(&self.collection, key) {
            Ok(()) | Err(IndexError::NotFound) => Ok(()),
            Err(e) => Err(e.into_shelf_error(key)),
        }
    }

    fn clear(&self) -> Result<(), ShelfError> {
        tracing::warn!(index = %self.collection.index, "Dropping entire shelf index");
        match self.client.drop_index(&self.collection.index) {
            Ok(()) | Err(IndexError::NotFound) => Ok(()),
            Err(e) => Err(e.into_shelf_error(&self.collection.index)),
        }
    }

    fn kind(&self) -> &'static str {
        "durable_index"
    }
}
