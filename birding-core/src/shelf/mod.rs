//! The shelf: track values by key, without iteration.
//!
//! A shelf answers "have I seen this key, and what did I store for it?".
//! It deliberately offers no `len`, `keys`, or iteration: the bounded
//! backend forgets entries and the durable backend is unbounded, so neither
//! can give a meaningful enumeration.

mod fresh;
mod index;
mod lru;
mod memory_index;

pub use self::fresh::FreshShelf;
pub use self::index::{Collection, DocumentIndex, IndexShelf, DEFAULT_COLLECTION_NAME};
pub use self::lru::{LruShelf, DEFAULT_MAXSIZE};
pub use self::memory_index::MemoryIndex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::ShelfError;

/// Backend init parameters, as read from configuration.
pub type InitParams = serde_json::Map<String, Value>;

/// Capability set every shelf backend provides.
///
/// All operations take `&self`; backends use interior mutability so a shelf
/// can be shared as `Arc<dyn Shelf>`.
pub trait Shelf: Send + Sync {
    /// Returns the value stored for `key`, or `ShelfError::NotFound`.
    fn get(&self, key: &str) -> Result<Value, ShelfError>;

    /// Stores `value` for `key`, overwriting any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), ShelfError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), ShelfError>;

    /// Removes every entry the backend holds.
    ///
    /// For the durable index backend this drops the whole backing index, not
    /// only the keys this process wrote.
    fn clear(&self) -> Result<(), ShelfError>;

    /// Returns `true` if `get` would succeed.
    ///
    /// `NotFound` becomes `false`; any other error is propagated.
    fn contains(&self, key: &str) -> Result<bool, ShelfError> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(ShelfError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Short backend identifier, used in logs.
    fn kind(&self) -> &'static str;
}

impl<S: Shelf + ?Sized> Shelf for Box<S> {
    fn get(&self, key: &str) -> Result<Value, ShelfError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ShelfError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), ShelfError> {
        (**self).delete(key)
    }

    fn clear(&self) -> Result<(), ShelfError> {
        (**self).clear()
    }

    fn contains(&self, key: &str) -> Result<bool, ShelfError> {
        (**self).contains(key)
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}

impl<S: Shelf + ?Sized> Shelf for Arc<S> {
    fn get(&self, key: &str) -> Result<Value, ShelfError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ShelfError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), ShelfError> {
        (**self).delete(key)
    }

    fn clear(&self) -> Result<(), ShelfError> {
        (**self).clear()
    }

    fn contains(&self, key: &str) -> Result<bool, ShelfError> {
        (**self).contains(key)
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}

/// Typed access on top of any [`Shelf`].
pub trait ShelfExt: Shelf {
    /// Retrieves and deserializes a value.
    ///
    /// A stored value that does not deserialize into `T` is treated as
    /// absent and returns `NotFound`.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, ShelfError> {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|_| ShelfError::not_found(key))
    }

    /// Serializes and stores a value.
    fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ShelfError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ShelfError::configuration(format!("value for {key} is not serializable: {e}")))?;
        self.set(key, value)
    }
}

impl<S: Shelf + ?Sized> ShelfExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Marker {
        term: String,
        timestamp: String,
    }

    #[test]
    fn test_boxed_shelf_forwards() {
        let shelf: Box<dyn Shelf> = Box::new(LruShelf::with_maxsize(4).unwrap());
        shelf.set("a", json!(1)).unwrap();

        assert_eq!(shelf.get("a").unwrap(), json!(1));
        assert!(shelf.contains("a").unwrap());
        assert_eq!(shelf.kind(), "bounded_eviction");
    }

    #[test]
    fn test_typed_round_trip() {
        let shelf = LruShelf::with_maxsize(4).unwrap();
        let marker = Marker {
            term: "pypi".to_string(),
            timestamp: "2016-01-01T00:00:00Z".to_string(),
        };
        shelf.set_as("pypi", &marker).unwrap();

        let back: Marker = shelf.get_as("pypi").unwrap();
        assert_eq!(back, marker);
    }

    #[test]
    fn test_typed_mismatch_is_not_found() {
        let shelf = LruShelf::with_maxsize(4).unwrap();
        shelf.set("pypi", json!("not a marker")).unwrap();

        let result: Result<Marker, _> = shelf.get_as("pypi");
        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn test_contains_propagates_backend_errors() {
        struct Down;

        impl Shelf for Down {
            fn get(&self, _key: &str) -> Result<Value, ShelfError> {
                Err(ShelfError::BackendUnavailable("down".into()))
            }
            fn set(&self, _key: &str, _value: Value) -> Result<(), ShelfError> {
                Ok(())
            }
            fn delete(&self, _key: &str) -> Result<(), ShelfError> {
                Ok(())
            }
            fn clear(&self) -> Result<(), ShelfError> {
                Ok(())
            }
            fn kind(&self) -> &'static str {
                "down"
            }
        }

        let err = Down.contains("a").unwrap_err();
        assert!(matches!(err, ShelfError::BackendUnavailable(_)));
    }
}
