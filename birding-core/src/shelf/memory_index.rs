use dashmap::DashMap;
use serde_json::Value;

use super::{Collection, DocumentIndex};
use crate::error::IndexError;

type DocKey = (String, String);

/// In-process [`DocumentIndex`] backed by `DashMap`.
///
/// Writes are visible immediately, so the refresh flag has nothing to do.
/// Missing documents and missing indices report `IndexError::NotFound`,
/// matching what a real index answers.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    indices: DashMap<String, DashMap<DocKey, Value>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn doc_key(collection: &Collection, id: &str) -> DocKey {
        (collection.doc_type.clone(), id.to_string())
    }
}

impl DocumentIndex for MemoryIndex {
    fn get(&self, collection: &Collection, id: &str) -> Result<Value, IndexError> {
        let docs = self.indices.get(&collection.index).ok_or(IndexError::NotFound)?;
        let doc = docs
            .get(&Self::doc_key(collection, id))
            .ok_or(IndexError::NotFound)?;
        Ok(doc.value().clone())
    }

    fn index(&self, collection: &Collection, id: &str, body: &Value, _refresh: bool) -> Result<(), IndexError> {
        self.indices
            .entry(collection.index.clone())
            .or_default()
            .insert(Self::doc_key(collection, id), body.clone());
        Ok(())
    }

    fn delete(&self, collection: &Collection, id: &str) -> Result<(), IndexError> {
        let docs = self.indices.get(&collection.index).ok_or(IndexError::NotFound)?;
        docs.remove(&Self::doc_key(collection, id))
            .map(|_| ())
            .ok_or(IndexError::NotFound)
    }

    fn drop_index(&self, index: &str) -> Result<(), IndexError> {
        self.indices
            .remove(index)
            .map(|_| ())
            .ok_or(IndexError::NotFound)
    }
}
