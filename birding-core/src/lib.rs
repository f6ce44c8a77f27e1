//! # Birding Core
//!
//! Tracking shelves for stream stages that must not repeat expensive work.
//!
//! A shelf is a key/value store you can write to and look things up in, but
//! never iterate or count. Stages use it to remember which search terms they
//! already searched and which statuses they already published.
//!
//! ## Features
//!
//! - `bounded_eviction`: in-memory, at most `maxsize` entries, LRU eviction
//! - `durable_index`: one document per key in an external index, with
//!   read-your-writes visibility
//! - Freshness: a time-to-live that composes onto any backend (lazy, checked
//!   on read, no background sweep)
//! - A registry that builds shelves from declarative configuration
//!
//! ## Example
//!
//! ```rust
//! use birding_core::{DedupGuard, ShelfConfig, ShelfError, ShelfRegistry};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let registry = ShelfRegistry::new();
//! let config = ShelfConfig::new("bounded_eviction")
//!     .with_init("maxsize", 500)
//!     .with_expire_after(Duration::from_secs(300));
//! let guard = DedupGuard::new(registry.build(&config).unwrap());
//!
//! let mut searches = 0;
//! for term in ["rust", "storm", "rust"] {
//!     guard
//!         .run::<_, ShelfError, _>(term, json!("2016-01-01T00:00:00Z"), || {
//!             searches += 1;
//!             Ok(())
//!         })
//!         .unwrap();
//! }
//! assert_eq!(searches, 2);
//! ```

mod clock;
mod config;
mod dedup;
mod entry;
mod error;
mod registry;
mod shelf;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BirdingConfig, ConfigError, IndexConfig, PublishOutput, PublishStageConfig, SearchConfig, StageConfig,
    TermCycleConfig, BIRDING_CONF_DEFAULT, BIRDING_CONF_ENV,
};
pub use dedup::{DedupGuard, Outcome};
pub use entry::FreshEntry;
pub use error::{BoxError, IndexError, ShelfError};
pub use registry::{ShelfConfig, ShelfConstructor, ShelfRegistry, BOUNDED_EVICTION, DURABLE_INDEX};
pub use shelf::{
    Collection, DocumentIndex, FreshShelf, IndexShelf, InitParams, LruShelf, MemoryIndex, Shelf, ShelfExt,
    DEFAULT_COLLECTION_NAME, DEFAULT_MAXSIZE,
};
