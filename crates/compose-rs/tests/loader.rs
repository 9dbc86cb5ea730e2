use std::time::Duration;

use compose_rs::prelude::*;
use serde_json::json;

#[tokio::test]
async fn loaded_fragments_feed_a_run() {
    let loaded = FragmentLoader::new("caller")
        .value("caller", json!({"id": "c1", "name": "Ada"}))
        .fragment("memories", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(json!([{"key": "pet", "value": "a cat", "category": "personal"}]))
        })
        .fragment("goals", async { Err("goals service unavailable".to_string()) })
        .load()
        .await;

    let composer = Composer::new(ComposerConfig::default())
        .unwrap()
        .with_observer(NoopObserver);
    let result = composer.compose(&loaded).unwrap();

    assert_eq!(result.document["memories"]["totalCount"], 1);
    assert!(!result.document.contains_key("learnerGoals"));
    assert_eq!(result.metadata.memory_count, 1);
    assert!(result.metadata.load_time_ms >= 10.0);
}

#[tokio::test]
async fn timed_out_fragment_falls_back() {
    let loaded = FragmentLoader::new("caller")
        .fragment_timeout(Duration::from_millis(50))
        .value("caller", json!({"id": "c1"}))
        .fragment("memories", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(json!([{"key": "late"}]))
        })
        .load()
        .await;

    let result = Composer::new(ComposerConfig::default())
        .unwrap()
        .with_observer(NoopObserver)
        .compose(&loaded)
        .unwrap();
    assert_eq!(result.document["memories"], json!({}));
}

#[tokio::test]
async fn subject_that_fails_to_load_is_fatal() {
    let loaded = FragmentLoader::new("caller")
        .fragment("caller", async { Err("not found".to_string()) })
        .load()
        .await;
    let err = Composer::new(ComposerConfig::default())
        .unwrap()
        .compose(&loaded)
        .unwrap_err();
    assert!(matches!(err, ComposeError::MissingSubject { .. }));
}
