//! Check-then-mark dedup around a shelf.
//!
//! For each key: if the shelf already holds it, skip; otherwise run the
//! expensive operation and, only if it succeeds, mark the key. The check and
//! the mark are not atomic. A replayed element racing its original can run
//! the operation twice; downstream writes are keyed by the same identifier,
//! so the duplicate is redundant work rather than a wrong result.

use serde_json::Value;
use std::sync::Arc;

use crate::error::ShelfError;
use crate::shelf::Shelf;

/// Result of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The key was new; the operation ran and produced `T`.
    Performed(T),
    /// The key was already on the shelf; nothing ran.
    Skipped,
}

impl<T> Outcome<T> {
    pub fn is_performed(&self) -> bool {
        matches!(self, Outcome::Performed(_))
    }

    pub fn performed(self) -> Option<T> {
        match self {
            Outcome::Performed(value) => Some(value),
            Outcome::Skipped => None,
        }
    }
}

/// Applies the dedup protocol using one shelf.
#[derive(Clone)]
pub struct DedupGuard {
    shelf: Arc<dyn Shelf>,
}

impl DedupGuard {
    pub fn new(shelf: Arc<dyn Shelf>) -> Self {
        Self { shelf }
    }

    pub fn shelf(&self) -> &Arc<dyn Shelf> {
        &self.shelf
    }

    /// Runs `op` unless `key` is already on the shelf, then marks `key`
    /// with `marker`.
    ///
    /// An error from `op` leaves `key` unmarked, so a replay of the same
    /// element tries again. Shelf errors convert into `E`.
    pub fn run<T, E, F>(&self, key: &str, marker: Value, op: F) -> Result<Outcome<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<ShelfError>,
    {
        if self.shelf.contains(key)? {
            tracing::debug!(key, kind = self.shelf.kind(), "Skipping seen key");
            return Ok(Outcome::Skipped);
        }

        let value = op()?;
        self.shelf.set(key, marker)?;
        tracing::debug!(key, kind = self.shelf.kind(), "Marked key");
        Ok(Outcome::Performed(value))
    }

    /// Publishes every item whose id is not on the shelf yet, marking each
    /// id (with `null`) right after it is published.
    ///
    /// Items without an id are dropped with a warning and never marked.
    /// Stops at the first error; items published before it stay marked.
    /// Returns the number of items published.
    pub fn filter_unseen<I, T, K, P, E>(&self, items: I, id_of: K, mut publish: P) -> Result<usize, E>
    where
        I: IntoIterator<Item = T>,
        K: Fn(&T) -> Option<String>,
        P: FnMut(T) -> Result<(), E>,
        E: From<ShelfError>,
    {
        let mut published = 0;
        for item in items {
            let Some(id) = id_of(&item) else {
                tracing::warn!(kind = self.shelf.kind(), "Dropping item without an id");
                continue;
            };
            let outcome = self.run(&id, Value::Null, || publish(item))?;
            if outcome.is_performed() {
                published += 1;
            }
        }
        Ok(published)
    }
}
