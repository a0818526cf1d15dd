//! Integration tests for the retry executor bound from configuration.

use azservice_config::{ConfigManager, FileFormat};
use azservice_retry::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[test]
fn test_executor_from_configuration_section() {
    let config = ConfigManager::new();
    config
        .load_str(
            r#"{"RetryPolicy": {"MaxRetries": 4, "DelayMilliseconds": 10, "MaxDelayMilliseconds": 60}}"#,
            FileFormat::Json,
        )
        .unwrap();

    let settings: RetryPolicySettings = config
        .section(RetryPolicySettings::CONFIGURATION_KEY)
        .unwrap();
    let executor = RetryExecutor::from_settings(&settings);

    assert_eq!(
        executor.config(),
        RetryConfig::new(4, Duration::from_millis(10), Duration::from_millis(60))
    );
    assert_eq!(
        executor.config().delay_schedule(),
        vec![
            Duration::from_millis(5),
            Duration::from_millis(15),
            Duration::from_millis(35),
            Duration::from_millis(60),
        ]
    );
}

#[test]
fn test_missing_section_uses_defaults() {
    let config = ConfigManager::new();
    let settings: RetryPolicySettings = config
        .section_or_default(RetryPolicySettings::CONFIGURATION_KEY)
        .unwrap();

    assert_eq!(RetryConfig::from(settings), RetryConfig::default());
}

#[tokio::test(start_paused = true)]
async fn test_total_backoff_matches_schedule() {
    let config = RetryConfig::new(5, Duration::from_millis(40), Duration::from_millis(200));
    let executor = RetryExecutor::new(config);
    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();

    let result: Result<(), String> = executor
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            }
        })
        .await;

    let expected: Duration = config.delay_schedule().iter().sum();
    let elapsed = started.elapsed();

    assert_eq!(result, Err("down".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert!(elapsed >= expected, "elapsed {:?} < {:?}", elapsed, expected);
    assert!(elapsed < expected + Duration::from_millis(10));
}

#[tokio::test]
async fn test_concurrent_calls_on_one_executor() {
    let executor = RetryExecutor::new(RetryConfig::immediate(3));

    let tasks: Vec<_> = (0..8u32)
        .map(|fail_times| {
            let executor = executor.clone();
            tokio::spawn(async move {
                let calls = Arc::new(AtomicU32::new(0));
                let result: Result<u32, String> = executor
                    .run(|| {
                        let calls = calls.clone();
                        async move {
                            let n = calls.fetch_add(1, Ordering::SeqCst);
                            if n < fail_times {
                                tokio::task::yield_now().await;
                                Err(format!("call {}", n))
                            } else {
                                Ok(n)
                            }
                        }
                    })
                    .await;
                (fail_times, result)
            })
        })
        .collect();

    for task in tasks {
        let (fail_times, result) = task.await.unwrap();
        if fail_times <= 3 {
            assert_eq!(result, Ok(fail_times));
        } else {
            assert_eq!(result, Err("call 3".to_string()));
        }
    }
}
