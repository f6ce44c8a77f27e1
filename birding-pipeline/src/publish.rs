//! Destinations for published statuses.

use birding_core::{Collection, DocumentIndex};
use serde_json::Value;
use std::io::Write;

use crate::error::PipelineError;
use crate::stages::status_id;

/// Receives each status that has not been published before.
pub trait Publisher {
    fn publish(&mut self, status: Value) -> Result<(), PipelineError>;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&mut self, status: Value) -> Result<(), PipelineError> {
        (**self).publish(status)
    }
}

/// Writes one JSON document per line.
pub struct JsonLinesPublisher<W> {
    out: W,
}

impl<W: Write> JsonLinesPublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Publisher for JsonLinesPublisher<W> {
    fn publish(&mut self, status: Value) -> Result<(), PipelineError> {
        serde_json::to_writer(&mut self.out, &status)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Indexes each status by id.
///
/// Writes do not force a refresh; nothing reads these documents back
/// through this process.
pub struct IndexPublisher<I> {
    client: I,
    collection: Collection,
}

impl<I: DocumentIndex> IndexPublisher<I> {
    pub fn new(client: I, collection: Collection) -> Self {
        tracing::info!(collection = %collection, "Publishing statuses to index");
        Self { client, collection }
    }
}

impl<I: DocumentIndex> Publisher for IndexPublisher<I> {
    fn publish(&mut self, status: Value) -> Result<(), PipelineError> {
        let id = status_id(&status).ok_or_else(|| PipelineError::InvalidKey("status without id".to_string()))?;
        self.client.index(&self.collection, &id, &status, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use birding_core::MemoryIndex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_json_lines() {
        let mut publisher = JsonLinesPublisher::new(Vec::new());
        publisher.publish(json!({"id": 1, "text": "a"})).unwrap();
        publisher.publish(json!({"id": 2})).unwrap();

        let out = String::from_utf8(publisher.into_inner()).unwrap();
        assert_eq!(out, "{\"id\":1,\"text\":\"a\"}\n{\"id\":2}\n");
    }

    #[test]
    fn test_index_publisher() {
        let index = Arc::new(MemoryIndex::new());
        let collection = Collection::new("tweet", "tweet");
        let mut publisher = IndexPublisher::new(Arc::clone(&index), collection.clone());

        publisher.publish(json!({"id": 42, "text": "hi"})).unwrap();

        assert_eq!(index.get(&collection, "42").unwrap(), json!({"id": 42, "text": "hi"}));
    }

    #[test]
    fn test_index_publisher_needs_id() {
        let mut publisher = IndexPublisher::new(MemoryIndex::new(), Collection::default());
        assert!(matches!(
            publisher.publish(json!({"text": "anonymous"})),
            Err(PipelineError::InvalidKey(_))
        ));
    }
}
