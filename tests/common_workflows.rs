//! Integration tests for common azservice workflows.
//!
//! These tests exercise the retry executor and optimistic patching together
//! the way application code uses them.

use azservice::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => panic!("fields must be an object"),
    }
}

// =============================================================================
// Retry Executor
// =============================================================================

#[tokio::test]
async fn test_always_failing_operation() {
    let executor = RetryExecutor::new(RetryConfig::immediate(4));
    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<(), String> = executor
        .run(|| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("attempt {}", n))
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(result, Err("attempt 4".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_success_timing() {
    let executor = RetryExecutor::default();
    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();

    let result: Result<&str, &str> = executor
        .run(|| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient")
                } else {
                    Ok("third time")
                }
            }
        })
        .await;

    let elapsed = started.elapsed();
    assert_eq!(result, Ok("third time"));
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(210));
}

#[test]
fn test_retry_policy_from_configuration() {
    let config = ConfigManager::new();
    config
        .load_str(
            "[RetryPolicy]\nMaxRetries = 5\nDelayMilliseconds = 100\nMaxDelayMilliseconds = 1000\n",
            FileFormat::Toml,
        )
        .unwrap();

    let settings: RetryPolicySettings = config
        .section(RetryPolicySettings::CONFIGURATION_KEY)
        .unwrap();
    let schedule = RetryConfig::from(&settings).delay_schedule();

    let millis: Vec<u128> = schedule.iter().map(Duration::as_millis).collect();
    assert_eq!(millis, vec![50, 150, 350, 750, 1000]);
}

#[test]
fn test_blocking_callers() {
    let executor = RetryExecutor::new(RetryConfig::immediate(1));
    let mut calls = 0;

    let result: Result<u32, String> = executor.run_blocking(|| {
        calls += 1;
        if calls == 1 { Err("first".into()) } else { Ok(calls) }
    });

    assert_eq!(result, Ok(2));
}

// =============================================================================
// Optimistic Patch
// =============================================================================

#[tokio::test]
async fn test_status_and_counter_update() {
    let store = MemoryStore::new();
    let key = RecordKey::new("jobs", "job-1");
    store
        .insert(&key, fields(json!({"status": "queued", "counter": 5})))
        .await
        .unwrap();

    let executor = RetryExecutor::new(RetryConfig::immediate(2));
    let mutations = Mutations::new()
        .set("status", "done")
        .compute("counter", |current| {
            json!(current.get("counter").and_then(Value::as_i64).unwrap_or(0) + 1)
        });

    // Another writer lands between our first read and our write.
    let first_read = store.read(&key).await.unwrap();
    store
        .conditional_write(&key, fields(json!({"counter": 6})), &first_read.etag)
        .await
        .unwrap();
    let stale = store
        .conditional_write(&key, mutations.resolve(&first_read.fields).unwrap(), &first_read.etag)
        .await
        .unwrap_err();
    assert!(stale.is_conflict());

    // The patch re-reads and builds on the concurrent write.
    let receipt = patch(&store, &executor, &key, &mutations).await.unwrap();
    let record = store.read(&key).await.unwrap();

    assert_eq!(record.etag, receipt.etag);
    assert_eq!(record.get("counter"), Some(&json!(7)));
    assert_eq!(record.get("status"), Some(&json!("done")));
}

#[tokio::test]
async fn test_patch_cancelled_by_token() {
    let store = MemoryStore::new();
    let executor = RetryExecutor::new(RetryConfig::new(
        10,
        Duration::from_secs(60),
        Duration::from_secs(60),
    ));
    let token = CancellationToken::new();
    token.cancel();

    let key = RecordKey::new("jobs", "missing");
    let mutations = Mutations::new().set("status", "done");
    let outcome = executor
        .run_until_cancelled(&token, || async {
            patch(&store, &RetryExecutor::new(RetryConfig::no_retry()), &key, &mutations).await
        })
        .await;

    assert!(outcome.is_none());
}

#[cfg(feature = "azure")]
mod azure {
    use super::*;

    const SETTINGS: &str = r#"{
        "Azure": {
            "CosmosDb": {
                "ConnectionString": "AccountEndpoint=https://localhost:8081/;AccountKey=k==",
                "DatabaseName": "app",
                "Containers": [{"Reference": "jobs", "Id": "jobs", "DefaultPartitionKey": "tenant"}]
            }
        }
    }"#;

    #[tokio::test]
    async fn test_cosmos_patch_workflow() {
        let config = ConfigManager::new();
        config.load_str(SETTINGS, FileFormat::Json).unwrap();
        let services = AzureServices::in_memory(&config).unwrap();
        let cosmos = services.cosmos().unwrap();

        cosmos
            .upsert(
                &json!({"id": "j1", "tenant": "acme", "status": "queued", "counter": 5}),
                "jobs",
                None,
            )
            .await
            .unwrap();

        let receipt = cosmos
            .patch_atomic(
                &Mutations::new().set("status", "done").increment("counter", 1),
                "jobs",
                "acme",
                "j1",
            )
            .await
            .unwrap();
        assert_eq!(receipt.attempts, 1);

        let job: Value = cosmos.get("jobs", "acme", "j1").await.unwrap().unwrap();
        assert_eq!(job["counter"], json!(6));
        assert_eq!(job["status"], json!("done"));
    }
}
