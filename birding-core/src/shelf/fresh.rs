//! Freshness decorator: a time-to-live over any shelf.
//!
//! The decorator owns the `(value, freshness)` record shape. The wrapped
//! backend stores the packed record like any other value and knows nothing
//! about expiry; the decorator knows nothing about storage.
//!
//! Expiry is lazy. A stale record stays in the backend (taking a slot in a
//! bounded shelf, or a document in an index) until it is overwritten,
//! evicted, or deleted; it simply reads as `NotFound`.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::Shelf;
use crate::clock::{Clock, SystemClock};
use crate::entry::FreshEntry;
use crate::error::ShelfError;

/// Wraps a shelf so entries expire `expire_after` after their last `set`.
///
/// # Example
///
/// ```rust
/// use birding_core::{FreshShelf, LruShelf, ManualClock, Shelf};
/// use serde_json::json;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = ManualClock::default();
/// let shelf = FreshShelf::with_clock(
///     LruShelf::default(),
///     Some(Duration::from_secs(60)),
///     Arc::new(clock.clone()),
/// );
///
/// shelf.set("pypi", json!(1)).unwrap();
/// clock.advance(Duration::from_secs(61));
/// assert!(!shelf.contains("pypi").unwrap());
/// ```
pub struct FreshShelf<S> {
    inner: S,
    expire_after: RwLock<Option<Duration>>,
    clock: Arc<dyn Clock>,
}

impl<S: Shelf> FreshShelf<S> {
    /// Wraps `inner` using the system clock.
    ///
    /// `expire_after` of `None` keeps every entry fresh forever.
    pub fn new(inner: S, expire_after: Option<Duration>) -> Self {
        Self::with_clock(inner, expire_after, Arc::new(SystemClock::new()))
    }

    /// Wraps `inner` using the given clock.
    pub fn with_clock(inner: S, expire_after: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            expire_after: RwLock::new(expire_after),
            clock,
        }
    }

    /// Returns the current expiration threshold.
    pub fn expire_after(&self) -> Option<Duration> {
        *self.expire_after.read()
    }

    /// Changes the expiration threshold. Applies to entries already stored.
    pub fn set_expire_after(&self, expire_after: Option<Duration>) {
        *self.expire_after.write() = expire_after;
    }

    /// Gets a reference to the wrapped shelf.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwraps the wrapped shelf.
    #[inline]
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Shelf> Shelf for FreshShelf<S> {
    fn get(&self, key: &str) -> Result<Value, ShelfError> {
        let packed = self.inner.get(key)?;
        let entry = FreshEntry::unpack(packed).ok_or_else(|| ShelfError::not_found(key))?;

        if entry.is_fresh(self.clock.now(), self.expire_after()) {
            Ok(entry.into_value())
        } else {
            tracing::trace!(key, "Entry is stale");
            Err(ShelfError::not_found(format!("{key} (stale)")))
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ShelfError> {
        let entry = FreshEntry::new(value, self.clock.now());
        self.inner.set(key, entry.pack())
    }

    fn delete(&self, key: &str) -> Result<(), ShelfError> {
        self.inner.delete(key)
    }

    fn clear(&self) -> Result<(), ShelfError> {
        self.inner.clear()
    }

    fn kind(&self) -> &'static str {
        self.inner.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::shelf::{Collection, IndexShelf, LruShelf, MemoryIndex};
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(30);

    fn fresh<S: Shelf>(inner: S, expire_after: Option<Duration>) -> (FreshShelf<S>, ManualClock) {
        let clock = ManualClock::at(Duration::from_secs(1_000));
        let shelf = FreshShelf::with_clock(inner, expire_after, Arc::new(clock.clone()));
        (shelf, clock)
    }

    fn lru(maxsize: usize) -> LruShelf {
        LruShelf::with_maxsize(maxsize).unwrap()
    }

    #[test]
    fn test_fresh_before_expiry() {
        let (shelf, clock) = fresh(lru(10), Some(TTL));
        shelf.set("pypi", json!("v")).unwrap();

        clock.advance(TTL - Duration::from_secs(1));
        assert_eq!(shelf.get("pypi").unwrap(), json!("v"));
    }

    #[test]
    fn test_fresh_at_exact_boundary() {
        let (shelf, clock) = fresh(lru(10), Some(TTL));
        shelf.set("pypi", json!("v")).unwrap();

        clock.advance(TTL);
        assert_eq!(shelf.get("pypi").unwrap(), json!("v"));
    }

    #[test]
    fn test_fresh_at_exact_boundary_with_subsecond_stamp() {
        for nanos in [1, 123_456_789, 314_159_265, 500_000_001, 777_777_777, 999_999_999] {
            let start = Duration::new(1_700_000_000, nanos);
            let clock = ManualClock::at(start);
            let shelf = FreshShelf::with_clock(lru(10), Some(TTL), Arc::new(clock.clone()));
            shelf.set("a", json!("v")).unwrap();

            clock.set(start + TTL);
            assert!(shelf.contains("a").unwrap(), "stale at boundary for nanos {nanos}");

            clock.advance(Duration::from_nanos(1));
            assert!(!shelf.contains("a").unwrap(), "fresh past boundary for nanos {nanos}");
        }
    }

    #[test]
    fn test_stale_after_expiry() {
        let (shelf, clock) = fresh(lru(10), Some(TTL));
        shelf.set("pypi", json!("v")).unwrap();

        clock.advance(TTL + Duration::from_millis(1));
        let err = shelf.get("pypi").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("stale"));
        assert!(!shelf.contains("pypi").unwrap());
    }

    #[test]
    fn test_stale_record_stays_in_backend() {
        let (shelf, clock) = fresh(lru(10), Some(TTL));
        shelf.set("pypi", json!("v")).unwrap();
        clock.advance(TTL * 2);

        assert!(!shelf.contains("pypi").unwrap());
        assert!(shelf.inner().contains("pypi").unwrap());
    }

    #[test]
    fn test_set_resets_freshness() {
        let (shelf, clock) = fresh(lru(10), Some(TTL));
        shelf.set("pypi", json!(1)).unwrap();
        clock.advance(TTL);
        shelf.set("pypi", json!(2)).unwrap();
        clock.advance(TTL);

        assert_eq!(shelf.get("pypi").unwrap(), json!(2));
    }

    #[test]
    fn test_no_expiry_keeps_everything_fresh() {
        let (shelf, clock) = fresh(lru(10), None);
        shelf.set("pypi", json!("v")).unwrap();

        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(shelf.get("pypi").unwrap(), json!("v"));
    }

    #[test]
    fn test_expiry_changeable_at_runtime() {
        let (shelf, clock) = fresh(lru(10), None);
        shelf.set("pypi", json!("v")).unwrap();
        clock.advance(TTL * 2);
        assert!(shelf.contains("pypi").unwrap());

        shelf.set_expire_after(Some(TTL));
        assert_eq!(shelf.expire_after(), Some(TTL));
        assert!(!shelf.contains("pypi").unwrap());

        shelf.set_expire_after(None);
        assert!(shelf.contains("pypi").unwrap());
    }

    #[test]
    fn test_unpacked_value_in_backend_is_not_found() {
        let (shelf, _clock) = fresh(lru(10), Some(TTL));
        shelf.inner().set("raw", json!("not packed")).unwrap();

        assert!(shelf.get("raw").unwrap_err().is_not_found());
    }

    #[test]
    fn test_backend_sees_packed_record() {
        let (shelf, _clock) = fresh(lru(10), Some(TTL));
        shelf.set("pypi", json!("v")).unwrap();

        assert_eq!(shelf.inner().get("pypi").unwrap(), json!(["v", 1000, 0]));
    }

    #[test]
    fn test_preserves_bounded_capacity() {
        let (shelf, _clock) = fresh(lru(2), Some(TTL));
        shelf.set("a", json!(1)).unwrap();
        shelf.set("b", json!(2)).unwrap();
        shelf.get("a").unwrap();
        shelf.set("c", json!(3)).unwrap();

        assert!(shelf.contains("a").unwrap());
        assert!(!shelf.contains("b").unwrap());
        assert!(shelf.contains("c").unwrap());
    }

    #[test]
    fn test_preserves_index_visibility() {
        let (shelf, clock) = fresh(
            IndexShelf::new(MemoryIndex::new(), Collection::default()),
            Some(TTL),
        );
        shelf.set("pypi", json!({"n": 1})).unwrap();
        assert_eq!(shelf.get("pypi").unwrap(), json!({"n": 1}));

        clock.advance(TTL + Duration::from_secs(1));
        assert!(!shelf.contains("pypi").unwrap());
        assert_eq!(shelf.kind(), "durable_index");
    }

    #[test]
    fn test_delete_and_clear_forward() {
        let (shelf, _clock) = fresh(lru(10), Some(TTL));
        shelf.set("a", json!(1)).unwrap();
        shelf.set("b", json!(2)).unwrap();

        shelf.delete("a").unwrap();
        assert!(!shelf.contains("a").unwrap());
        assert!(shelf.contains("b").unwrap());

        shelf.clear().unwrap();
        assert!(!shelf.contains("b").unwrap());
    }
}
