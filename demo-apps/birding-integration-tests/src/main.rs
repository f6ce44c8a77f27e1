use anyhow::Result;
use birding_core::{DedupGuard, Shelf, ShelfConfig, ShelfError, ShelfRegistry, DURABLE_INDEX};
use birding_index_client::IndexClientOptions;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "birding_integration_tests=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = IndexClientOptions::from_env();
    tracing::info!("🧪 Birding Integration Tests");
    tracing::info!("   Index: {}", options.url);
    println!();

    let mut registry = ShelfRegistry::new();
    birding_index_client::register(&mut registry, options);

    // Run all tests
    test_basic_operations(&registry)?;
    test_parallel_set_get(&registry)?;
    test_index_isolation(&registry)?;
    test_expiration(&registry)?;
    test_clear_drops_index(&registry)?;
    test_publish_dedup_across_processes(&registry)?;

    println!();
    tracing::info!("✅ All tests passed!");

    Ok(())
}

/// A durable shelf on a fresh, uniquely named index.
fn scratch_shelf(registry: &ShelfRegistry, prefix: &str) -> Result<(Arc<dyn Shelf>, String)> {
    let index = format!("{}-{}", prefix, uuid::Uuid::new_v4());
    let shelf = registry.build(&ShelfConfig::new(DURABLE_INDEX).with_init("index", index.as_str()))?;
    Ok((shelf, index))
}

/// Test SET/GET/DELETE with read-your-writes visibility
fn test_basic_operations(registry: &ShelfRegistry) -> Result<()> {
    tracing::info!("Test: Basic Operations");

    let (shelf, _) = scratch_shelf(registry, "basic-test")?;
    let key = format!("term-{}", uuid::Uuid::new_v4());

    // GET before SET
    assert!(shelf.get(&key).unwrap_err().is_not_found(), "Key should not exist yet");

    // SET then GET, no wait in between
    shelf.set(&key, json!({"timestamp": "2016-01-01T00:00:00Z"}))?;
    assert_eq!(
        shelf.get(&key)?,
        json!({"timestamp": "2016-01-01T00:00:00Z"}),
        "Value should be visible right after the write"
    );

    // Overwrite
    shelf.set(&key, json!("second"))?;
    assert_eq!(shelf.get(&key)?, json!("second"), "Overwrite should win");

    // DELETE, twice
    shelf.delete(&key)?;
    shelf.delete(&key)?;
    assert!(!shelf.contains(&key)?, "Key should not be found after delete");

    shelf.clear()?;
    tracing::info!("   ✓ Basic operations work correctly");
    Ok(())
}

/// Test writes from many threads land under the right keys
fn test_parallel_set_get(registry: &ShelfRegistry) -> Result<()> {
    let num_operations = 200;
    let num_threads = 8;
    tracing::info!("Test: Parallel SET/GET ({} operations, {} threads)", num_operations, num_threads);

    let (shelf, _) = scratch_shelf(registry, "parallel-test")?;
    let test_data: Vec<(String, String)> = (0..num_operations)
        .map(|i| (format!("key-{}", i), format!("value-{}-{}", i, uuid::Uuid::new_v4())))
        .collect();

    let start = Instant::now();
    thread::scope(|scope| -> Result<()> {
        let handles: Vec<_> = test_data
            .chunks(num_operations / num_threads)
            .map(|chunk| {
                let shelf = Arc::clone(&shelf);
                scope.spawn(move || -> Result<(), ShelfError> {
                    for (key, value) in chunk {
                        shelf.set(key, json!(value))?;
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
        }
        Ok(())
    })?;
    tracing::info!("   SET {} keys in {:?}", num_operations, start.elapsed());

    let start = Instant::now();
    let mut mismatches = 0;
    for (key, value) in &test_data {
        if shelf.get(key)? != json!(value) {
            mismatches += 1;
        }
    }
    tracing::info!("   GET {} keys in {:?}", num_operations, start.elapsed());

    assert_eq!(mismatches, 0, "Every key should hold its own value");

    shelf.clear()?;
    tracing::info!("   ✓ All {} values verified correctly", num_operations);
    Ok(())
}

/// Test two shelves on different indices do not see each other's keys
fn test_index_isolation(registry: &ShelfRegistry) -> Result<()> {
    tracing::info!("Test: Index Isolation");

    let (terms, _) = scratch_shelf(registry, "isolation-terms")?;
    let (tweets, _) = scratch_shelf(registry, "isolation-tweets")?;

    terms.set("shared-key", json!("term"))?;
    tweets.set("shared-key", json!("tweet"))?;

    assert_eq!(terms.get("shared-key")?, json!("term"));
    assert_eq!(tweets.get("shared-key")?, json!("tweet"));

    terms.clear()?;
    assert!(!terms.contains("shared-key")?, "Cleared shelf should be empty");
    assert!(tweets.contains("shared-key")?, "Other index should be untouched");

    tweets.clear()?;
    tracing::info!("   ✓ Indices are isolated");
    Ok(())
}

/// Test freshness over a durable shelf
fn test_expiration(registry: &ShelfRegistry) -> Result<()> {
    tracing::info!("Test: Freshness Expiration");

    let index = format!("expiration-test-{}", uuid::Uuid::new_v4());
    let config = ShelfConfig::new(DURABLE_INDEX)
        .with_init("index", index.as_str())
        .with_expire_after(Duration::from_secs(1));
    let shelf = registry.build(&config)?;

    shelf.set("pypi", json!("2016-01-01T00:00:00Z"))?;
    assert!(shelf.contains("pypi")?, "Key should be fresh right after set");

    tracing::info!("   Waiting 2 seconds for expiration...");
    thread::sleep(Duration::from_secs(2));

    assert!(!shelf.contains("pypi")?, "Key should be stale after expire_after");

    // a second write refreshes the stamp
    shelf.set("pypi", json!("2016-01-01T00:00:02Z"))?;
    assert!(shelf.contains("pypi")?, "Rewritten key should be fresh again");

    shelf.clear()?;
    tracing::info!("   ✓ Freshness expiration works correctly");
    Ok(())
}

/// Test clear drops the whole index and can be repeated
fn test_clear_drops_index(registry: &ShelfRegistry) -> Result<()> {
    tracing::info!("Test: Clear");

    let (shelf, index) = scratch_shelf(registry, "clear-test")?;
    for i in 0..10 {
        shelf.set(&format!("key-{}", i), json!(i))?;
    }

    shelf.clear()?;
    for i in 0..10 {
        assert!(!shelf.contains(&format!("key-{}", i))?, "Cleared key should be gone");
    }

    // index no longer exists; clearing again is fine
    shelf.clear()?;
    tracing::info!("   ✓ Index {} dropped, second clear is a no-op", index);
    Ok(())
}

/// Test two guards over the same index share publish marks
fn test_publish_dedup_across_processes(registry: &ShelfRegistry) -> Result<()> {
    tracing::info!("Test: Publish Dedup Across Shelves");

    let index = format!("pre_kafka_shelf-{}", uuid::Uuid::new_v4());
    let config = ShelfConfig::new(DURABLE_INDEX).with_init("index", index.as_str());
    let first = DedupGuard::new(registry.build(&config)?);
    let second = DedupGuard::new(registry.build(&config)?);

    let statuses = vec![json!({"id": 1}), json!({"id": 2})];
    let mut topic = Vec::new();

    let published = first.filter_unseen::<_, _, _, _, ShelfError>(
        statuses.clone(),
        |s| s.get("id").map(|id| id.to_string()),
        |s| {
            topic.push(s);
            Ok(())
        },
    )?;
    assert_eq!(published, 2);

    let published = second.filter_unseen::<_, _, _, _, ShelfError>(
        statuses,
        |s| s.get("id").map(|id| id.to_string()),
        |s| {
            topic.push(s);
            Ok(())
        },
    )?;
    assert_eq!(published, 0, "Second shelf should see the first one's marks");
    assert_eq!(topic.len(), 2);

    first.shelf().clear()?;
    tracing::info!("   ✓ Marks are shared through the index");
    Ok(())
}
