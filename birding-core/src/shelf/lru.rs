//! Bounded in-memory shelf with least-recently-used eviction.

use ::lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroUsize;

use super::{InitParams, Shelf};
use crate::error::ShelfError;

/// Default number of entries an [`LruShelf`] holds.
pub const DEFAULT_MAXSIZE: usize = 1000;

fn default_maxsize() -> usize {
    DEFAULT_MAXSIZE
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LruInit {
    #[serde(default = "default_maxsize")]
    maxsize: usize,
}

/// An in-memory shelf holding at most `maxsize` entries.
///
/// Every `get` hit and every `set` counts as a use. Inserting a new key into
/// a full shelf evicts exactly one entry, the least recently used one, and
/// never the entry being written. Forgotten keys read as `NotFound`, which
/// is the right answer when dedup only needs to suppress recent repeats.
///
/// # Example
///
/// ```rust
/// use birding_core::{LruShelf, Shelf};
/// use serde_json::json;
///
/// let shelf = LruShelf::with_maxsize(2).unwrap();
/// shelf.set("a", json!(1)).unwrap();
/// shelf.set("b", json!(2)).unwrap();
/// shelf.set("c", json!(3)).unwrap(); // evicts "a"
///
/// assert!(!shelf.contains("a").unwrap());
/// assert!(shelf.contains("c").unwrap());
/// ```
pub struct LruShelf {
    store: Mutex<LruCache<String, Value>>,
}

impl LruShelf {
    /// Creates a shelf with the given capacity.
    pub fn new(maxsize: NonZeroUsize) -> Self {
        Self {
            store: Mutex::new(LruCache::new(maxsize)),
        }
    }

    /// Creates a shelf with the given capacity, rejecting zero.
    pub fn with_maxsize(maxsize: usize) -> Result<Self, ShelfError> {
        let maxsize = NonZeroUsize::new(maxsize)
            .ok_or_else(|| ShelfError::configuration("maxsize must be greater than zero"))?;
        Ok(Self::new(maxsize))
    }

    /// Creates a shelf from init parameters: `{"maxsize": <n>}`.
    pub fn from_init(init: &InitParams) -> Result<Self, ShelfError> {
        let init: LruInit = serde_json::from_value(Value::Object(init.clone())).map_err(|e| {
            ShelfError::configuration(format!("invalid bounded_eviction init: {e}"))
        })?;
        tracing::info!(maxsize = init.maxsize, "Creating bounded eviction shelf");
        Self::with_maxsize(init.maxsize)
    }

    /// Returns the configured capacity.
    pub fn maxsize(&self) -> usize {
        self.store.lock().cap().get()
    }
}

impl Default for LruShelf {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_MAXSIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

impl Shelf for LruShelf {
    fn get(&self, key: &str) -> Result<Value, ShelfError> {
        self.store
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ShelfError::not_found(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ShelfError> {
        let mut store = self.store.lock();
        if let Some((evicted, _)) = store.push(key.to_string(), value) {
            // push hands back the old value on overwrite; only a different key is an eviction
            if evicted != key {
                tracing::trace!(evicted = %evicted, "Evicted least recently used entry");
            }
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ShelfError> {
        self.store.lock().pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), ShelfError> {
        self.store.lock().clear();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "bounded_eviction"
    }
}
