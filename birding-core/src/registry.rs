//! Backend registry and shelf factory.
//!
//! Backend selection happens here and nowhere else: callers hand over a
//! [`ShelfConfig`] and get back an `Arc<dyn Shelf>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ShelfError;
use crate::shelf::{Collection, FreshShelf, IndexShelf, InitParams, LruShelf, MemoryIndex, Shelf};

/// Backend kind of the bounded in-memory shelf.
pub const BOUNDED_EVICTION: &str = "bounded_eviction";

/// Backend kind of the durable index shelf.
pub const DURABLE_INDEX: &str = "durable_index";

/// Builds a backend from its init parameters.
pub type ShelfConstructor =
    Arc<dyn Fn(&InitParams) -> Result<Box<dyn Shelf>, ShelfError> + Send + Sync>;

/// Declarative description of a shelf.
///
/// ```json
/// {"kind": "bounded_eviction", "init": {"maxsize": 500}, "expire_after": 3600}
/// ```
///
/// `expire_after` is in seconds; when present the backend is wrapped in a
/// [`FreshShelf`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShelfConfig {
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub init: InitParams,

    #[serde(default, with = "duration_secs", skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<Duration>,
}

fn default_kind() -> String {
    BOUNDED_EVICTION.to_string()
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self::new(BOUNDED_EVICTION)
    }
}

impl ShelfConfig {
    /// Creates a config for the given backend kind with no init parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            init: InitParams::new(),
            expire_after: None,
        }
    }

    /// Sets an init parameter, replacing any existing value.
    pub fn with_init(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.init.insert(key.into(), value.into());
        self
    }

    /// Sets an init parameter only if the configuration does not already
    /// carry one, so user configuration wins over caller defaults.
    pub fn with_default_init(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.init.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    /// Sets the expiration threshold.
    pub fn with_expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_f64(d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    serde::de::Error::custom(format!(
                        "expire_after must be a non-negative number of seconds, got {secs}"
                    ))
                })
            })
            .transpose()
    }
}

/// Static mapping from backend kind to constructor.
///
/// [`ShelfRegistry::new`] knows `bounded_eviction`. The durable backend
/// needs an index client, so it is registered at startup by whoever owns
/// one (see [`ShelfRegistry::register_index`]).
#[derive(Clone)]
pub struct ShelfRegistry {
    constructors: HashMap<String, ShelfConstructor>,
}

impl ShelfRegistry {
    /// Creates a registry with the built-in `bounded_eviction` backend.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(BOUNDED_EVICTION, |init| {
            Ok(Box::new(LruShelf::from_init(init)?) as Box<dyn Shelf>)
        });
        registry
    }

    /// Creates a registry with no backends at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers (or replaces) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&InitParams) -> Result<Box<dyn Shelf>, ShelfError> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Arc::new(constructor));
        self
    }

    /// Registers `durable_index` with a constructor for the index client.
    ///
    /// `index` and `doc_type` are taken out of the init parameters; the rest
    /// are handed to `connect`.
    pub fn register_index<I, F>(&mut self, connect: F) -> &mut Self
    where
        I: crate::shelf::DocumentIndex + 'static,
        F: Fn(&InitParams) -> Result<I, ShelfError> + Send + Sync + 'static,
    {
        self.register(DURABLE_INDEX, move |init| {
            let (collection, client_init) = Collection::split_init(init)?;
            let client = connect(&client_init)?;
            Ok(Box::new(IndexShelf::new(client, collection)) as Box<dyn Shelf>)
        })
    }

    /// Registers `durable_index` over a shared in-process [`MemoryIndex`].
    ///
    /// Any init parameter besides `index`/`doc_type` is rejected.
    pub fn register_memory_index(&mut self, index: Arc<MemoryIndex>) -> &mut Self {
        self.register_index(move |init| {
            if let Some(field) = init.keys().next() {
                return Err(ShelfError::configuration(format!(
                    "unknown durable_index init field `{field}` for in-memory index"
                )));
            }
            Ok(Arc::clone(&index))
        })
    }

    /// Returns `true` if a constructor is registered for `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Builds a shelf from its description.
    ///
    /// # Errors
    ///
    /// `ShelfError::Configuration` for an unknown kind or invalid init
    /// parameters. Nothing is retried.
    pub fn build(&self, config: &ShelfConfig) -> Result<Arc<dyn Shelf>, ShelfError> {
        let constructor = self.constructors.get(&config.kind).ok_or_else(|| {
            let mut known: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
            known.sort_unstable();
            ShelfError::configuration(format!(
                "unknown shelf kind `{}` (known: {})",
                config.kind,
                known.join(", ")
            ))
        })?;

        let backend = constructor(&config.init)?;
        match config.expire_after {
            Some(expire_after) => {
                tracing::info!(
                    kind = %config.kind,
                    expire_after_secs = expire_after.as_secs_f64(),
                    "Wrapping shelf with freshness"
                );
                Ok(Arc::new(FreshShelf::new(backend, Some(expire_after))))
            }
            None => Ok(Arc::from(backend)),
        }
    }
}

impl Default for ShelfRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShelfRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.constructors.keys().collect();
        kinds.sort();
        f.debug_struct("ShelfRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with_memory_index() -> (ShelfRegistry, Arc<MemoryIndex>) {
        let index = Arc::new(MemoryIndex::new());
        let mut registry = ShelfRegistry::new();
        registry.register_memory_index(Arc::clone(&index));
        (registry, index)
    }

    #[test]
    fn test_build_default_is_bounded() {
        let shelf = ShelfRegistry::new().build(&ShelfConfig::default()).unwrap();
        assert_eq!(shelf.kind(), BOUNDED_EVICTION);

        shelf.set("a", json!(1)).unwrap();
        assert!(shelf.contains("a").unwrap());
    }

    #[test]
    fn test_build_passes_init() {
        let config = ShelfConfig::new(BOUNDED_EVICTION).with_init("maxsize", 1);
        let shelf = ShelfRegistry::new().build(&config).unwrap();

        shelf.set("a", json!(1)).unwrap();
        shelf.set("b", json!(2)).unwrap();
        assert!(!shelf.contains("a").unwrap());
    }

    #[test]
    fn test_build_unknown_kind() {
        let err = ShelfRegistry::new()
            .build(&ShelfConfig::new("LRUShelf"))
            .err()
            .unwrap();

        assert!(matches!(err, ShelfError::Configuration(_)));
        assert!(err.to_string().contains("LRUShelf"));
        assert!(err.to_string().contains(BOUNDED_EVICTION));
    }

    #[test]
    fn test_durable_index_needs_registration() {
        let registry = ShelfRegistry::new();
        assert!(!registry.contains(DURABLE_INDEX));
        assert!(registry.build(&ShelfConfig::new(DURABLE_INDEX)).is_err());
    }

    #[test]
    fn test_build_invalid_init() {
        let config = ShelfConfig::new(BOUNDED_EVICTION).with_init("maxsize", 0);
        assert!(matches!(
            ShelfRegistry::new().build(&config),
            Err(ShelfError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_memory_index() {
        let (registry, index) = registry_with_memory_index();
        let config = ShelfConfig::new(DURABLE_INDEX).with_init("index", "terms");
        let shelf = registry.build(&config).unwrap();
        assert_eq!(shelf.kind(), DURABLE_INDEX);

        shelf.set("pypi", json!(1)).unwrap();

        use crate::shelf::DocumentIndex;
        let doc = index.get(&Collection::new("terms", "shelf"), "pypi").unwrap();
        assert_eq!(doc, json!({"value": 1}));
    }

    #[test]
    fn test_build_memory_index_rejects_client_params() {
        let (registry, _index) = registry_with_memory_index();
        let config = ShelfConfig::new(DURABLE_INDEX).with_init("hosts", json!(["localhost"]));
        assert!(matches!(registry.build(&config), Err(ShelfError::Configuration(_))));
    }

    #[test]
    fn test_build_wraps_with_freshness() {
        let config = ShelfConfig::new(BOUNDED_EVICTION).with_expire_after(Duration::from_secs(60));
        let shelf = ShelfRegistry::new().build(&config).unwrap();
        shelf.set("a", json!("v")).unwrap();

        // freshness is invisible to the caller
        assert_eq!(shelf.get("a").unwrap(), json!("v"));
    }

    #[test]
    fn test_build_freshness_over_index_packs_records() {
        let (registry, index) = registry_with_memory_index();
        let config = ShelfConfig::new(DURABLE_INDEX).with_expire_after(Duration::from_secs(60));
        let shelf = registry.build(&config).unwrap();
        shelf.set("a", json!("v")).unwrap();

        use crate::shelf::DocumentIndex;
        let doc = index.get(&Collection::default(), "a").unwrap();
        let packed = doc.get("value").and_then(Value::as_array).unwrap();
        assert_eq!(packed.len(), 3);
        assert_eq!(packed[0], json!("v"));
    }

    #[test]
    fn test_register_replaces_constructor() {
        let mut registry = ShelfRegistry::new();
        registry.register(BOUNDED_EVICTION, |_| {
            Err(ShelfError::configuration("disabled"))
        });

        assert!(registry.build(&ShelfConfig::default()).is_err());
    }

    #[test]
    fn test_with_default_init_does_not_override() {
        let config = ShelfConfig::new(DURABLE_INDEX)
            .with_init("index", "mine")
            .with_default_init("index", "pre_kafka_shelf")
            .with_default_init("doc_type", "tweet");

        assert_eq!(config.init.get("index"), Some(&json!("mine")));
        assert_eq!(config.init.get("doc_type"), Some(&json!("tweet")));
    }

    #[test]
    fn test_config_deserialize() {
        let config: ShelfConfig = serde_json::from_value(json!({
            "kind": "durable_index",
            "init": {"index": "terms"},
            "expire_after": 1.5
        }))
        .unwrap();

        assert_eq!(config.kind, DURABLE_INDEX);
        assert_eq!(config.init.get("index"), Some(&json!("terms")));
        assert_eq!(config.expire_after, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: ShelfConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, ShelfConfig::default());

        let config: ShelfConfig = serde_json::from_value(json!({"expire_after": null})).unwrap();
        assert_eq!(config.expire_after, None);
    }

    #[test]
    fn test_config_rejects_negative_expiry() {
        let result: Result<ShelfConfig, _> = serde_json::from_value(json!({"expire_after": -5}));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let result: Result<ShelfConfig, _> =
            serde_json::from_value(json!({"shelf_class": "LRUShelf"}));
        assert!(result.is_err());
    }
}
