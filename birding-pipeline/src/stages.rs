use birding_core::{DedupGuard, Outcome, ShelfConfig, DURABLE_INDEX};
use serde_json::Value;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::publish::Publisher;
use crate::search::SearchApi;
use crate::spout::Term;

/// Maximum allowed key length (document ids in the index are capped at 512 bytes)
const MAX_KEY_LENGTH: usize = 512;

/// Index name the publish stage uses for a durable shelf unless configured
pub const PUBLISH_SHELF_INDEX: &str = "pre_kafka_shelf";

/// Truncates a key for logging
pub(crate) fn truncate_key_for_log(key: &str) -> String {
    const MAX_LOG_LEN: usize = 16;
    match key.char_indices().nth(MAX_LOG_LEN) {
        Some((end, _)) => format!("{}...", &key[..end]),
        None => key.to_string(),
    }
}

/// Validates that a key can be stored on a shelf
pub(crate) fn validate_key(key: &str) -> Result<(), PipelineError> {
    if key.is_empty() {
        return Err(PipelineError::InvalidKey("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(PipelineError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// The id of a status as a string, from `id_str` or a numeric/string `id`.
pub fn status_id(status: &Value) -> Option<String> {
    if let Some(id) = status.get("id_str").and_then(Value::as_str) {
        return Some(id.to_string());
    }
    match status.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Applies the publish stage's own default index name to a durable shelf,
/// leaving any configured `index` in place.
pub fn publish_shelf_config(config: &ShelfConfig) -> ShelfConfig {
    if config.kind == DURABLE_INDEX {
        config.clone().with_default_init("index", PUBLISH_SHELF_INDEX)
    } else {
        config.clone()
    }
}

/// A term that was searched, with the raw search response.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub term: String,
    pub timestamp: String,
    pub result: Value,
}

/// Searches each term at most once per shelf lifetime (or freshness window).
pub struct SearchStage<A> {
    guard: DedupGuard,
    api: Arc<A>,
}

impl<A: SearchApi> SearchStage<A> {
    pub fn new(guard: DedupGuard, api: Arc<A>) -> Self {
        Self { guard, api }
    }

    /// Returns `None` when the term was already searched.
    pub fn process(&self, term: &Term) -> Result<Option<SearchHit>, PipelineError> {
        validate_key(&term.term)?;

        let outcome = self.guard.run(&term.term, Value::from(term.timestamp.as_str()), || {
            tracing::info!("search: {}, {}", truncate_key_for_log(&term.term), term.timestamp);
            Ok::<_, PipelineError>(self.api.search(&term.term)?)
        })?;

        Ok(match outcome {
            Outcome::Performed(result) => Some(SearchHit {
                term: term.term.clone(),
                timestamp: term.timestamp.clone(),
                result,
            }),
            Outcome::Skipped => {
                tracing::debug!("SKIP {}", truncate_key_for_log(&term.term));
                None
            }
        })
    }
}

/// Hydrates a search response into full statuses.
pub struct LookupStage<A> {
    api: Arc<A>,
}

impl<A: SearchApi> LookupStage<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn process(&self, hit: &SearchHit) -> Result<Vec<Value>, PipelineError> {
        tracing::info!("lookup: {}, {}", truncate_key_for_log(&hit.term), hit.timestamp);
        Ok(self.api.lookup_search_result(&hit.result)?)
    }
}

/// Publishes each status at most once, keyed by status id.
pub struct PublishStage<P> {
    guard: DedupGuard,
    publisher: P,
}

impl<P: Publisher> PublishStage<P> {
    pub fn new(guard: DedupGuard, publisher: P) -> Self {
        Self { guard, publisher }
    }

    /// Returns the number of statuses published.
    ///
    /// Statuses without a usable id are skipped.
    pub fn process(&mut self, statuses: Vec<Value>) -> Result<usize, PipelineError> {
        let publisher = &mut self.publisher;
        let published = self.guard.filter_unseen(
            statuses,
            |status| {
                let id = status_id(status)?;
                match validate_key(&id) {
                    Ok(()) => Some(id),
                    Err(e) => {
                        tracing::warn!("Skipping status {}: {}", truncate_key_for_log(&id), e);
                        None
                    }
                }
            },
            |status| publisher.publish(status),
        )?;
        tracing::debug!(published, "Published statuses");
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::JsonLinesPublisher;
    use crate::search::{statuses_of, SearchError};
    use birding_core::{LruShelf, Shelf, ShelfRegistry, BOUNDED_EVICTION};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSearch {
        queries: Mutex<Vec<String>>,
        fail: Mutex<bool>,
    }

    impl SearchApi for FakeSearch {
        fn search(&self, q: &str) -> Result<Value, SearchError> {
            if *self.fail.lock().unwrap() {
                return Err(SearchError::MalformedResult("down".to_string()));
            }
            self.queries.lock().unwrap().push(q.to_string());
            Ok(json!({"results": [{"id": 1, "text": q}]}))
        }

        fn lookup_search_result(&self, result: &Value) -> Result<Vec<Value>, SearchError> {
            statuses_of(result)
        }
    }

    fn guard() -> DedupGuard {
        DedupGuard::new(Arc::new(LruShelf::default()))
    }

    fn term(t: &str) -> Term {
        Term {
            term: t.to_string(),
            timestamp: "2016-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_truncate_key_for_log() {
        assert_eq!(truncate_key_for_log("pypi"), "pypi");
        assert_eq!(truncate_key_for_log("0123456789abcdef"), "0123456789abcdef");
        assert_eq!(truncate_key_for_log("0123456789abcdefXYZ"), "0123456789abcdef...");
        assert_eq!(truncate_key_for_log(&"é".repeat(20)), format!("{}...", "é".repeat(16)));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("pypi").is_ok());
        assert!(validate_key(&"a".repeat(MAX_KEY_LENGTH)).is_ok());
        assert!(matches!(validate_key(""), Err(PipelineError::InvalidKey(_))));
        assert!(matches!(
            validate_key(&"a".repeat(MAX_KEY_LENGTH + 1)),
            Err(PipelineError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_status_id() {
        assert_eq!(status_id(&json!({"id": 12, "id_str": "12"})), Some("12".to_string()));
        assert_eq!(status_id(&json!({"id": 12})), Some("12".to_string()));
        assert_eq!(status_id(&json!({"id": "tag:search.twitter.com,2005:1"})), Some("tag:search.twitter.com,2005:1".to_string()));
        assert_eq!(status_id(&json!({"id": null})), None);
        assert_eq!(status_id(&json!({"text": "x"})), None);
    }

    #[test]
    fn test_search_stage_marks_with_timestamp() {
        let api = Arc::new(FakeSearch::default());
        let guard = guard();
        let stage = SearchStage::new(guard.clone(), Arc::clone(&api));

        let hit = stage.process(&term("pypi")).unwrap().unwrap();
        assert_eq!(hit.term, "pypi");
        assert!(stage.process(&term("pypi")).unwrap().is_none());

        assert_eq!(*api.queries.lock().unwrap(), vec!["pypi"]);
        assert_eq!(guard.shelf().get("pypi").unwrap(), json!("2016-01-01T00:00:00.000000Z"));
    }

    #[test]
    fn test_search_failure_leaves_term_unmarked() {
        let api = Arc::new(FakeSearch::default());
        let guard = guard();
        let stage = SearchStage::new(guard.clone(), Arc::clone(&api));

        *api.fail.lock().unwrap() = true;
        assert!(matches!(stage.process(&term("pypi")), Err(PipelineError::Search(_))));
        assert!(!guard.shelf().contains("pypi").unwrap());

        *api.fail.lock().unwrap() = false;
        assert!(stage.process(&term("pypi")).unwrap().is_some());
    }

    #[test]
    fn test_search_stage_rejects_empty_term() {
        let stage = SearchStage::new(guard(), Arc::new(FakeSearch::default()));
        assert!(matches!(stage.process(&term("")), Err(PipelineError::InvalidKey(_))));
    }

    #[test]
    fn test_lookup_stage() {
        let stage = LookupStage::new(Arc::new(FakeSearch::default()));
        let hit = SearchHit {
            term: "pypi".to_string(),
            timestamp: String::new(),
            result: json!({"results": [{"id": 1}, {"id": 2}]}),
        };

        assert_eq!(stage.process(&hit).unwrap().len(), 2);
    }

    #[test]
    fn test_publish_stage_dedups_by_id() {
        let mut stage = PublishStage::new(guard(), JsonLinesPublisher::new(Vec::new()));

        let first = stage
            .process(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 1})])
            .unwrap();
        let second = stage
            .process(vec![json!({"id": 2}), json!({"id": 3}), json!({"text": "no id"})])
            .unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 1);
        let out = String::from_utf8(stage.publisher.into_inner()).unwrap();
        assert_eq!(out, "{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n");
    }

    #[test]
    fn test_publish_shelf_config_defaults_index() {
        let durable = publish_shelf_config(&ShelfConfig::new(DURABLE_INDEX));
        assert_eq!(durable.init.get("index"), Some(&json!(PUBLISH_SHELF_INDEX)));

        let configured = publish_shelf_config(
            &ShelfConfig::new(DURABLE_INDEX).with_init("index", "mine"),
        );
        assert_eq!(configured.init.get("index"), Some(&json!("mine")));

        let bounded = publish_shelf_config(&ShelfConfig::new(BOUNDED_EVICTION));
        assert!(bounded.init.is_empty());
        assert!(ShelfRegistry::new().build(&bounded).is_ok());
    }
}
