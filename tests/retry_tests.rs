use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow};
use chat_relay::{
    models::retry::RetryConfig,
    utils::{jittered, retry_with_backoff},
};
use tokio::time::Instant;

fn cache_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 200,
        max_delay_ms: 2000,
        backoff_multiplier: 2,
    }
}

/// Test: A cache write that succeeds first time is not repeated
#[tokio::test]
async fn test_successful_write_is_not_retried() -> Result<()> {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result = retry_with_backoff(&cache_retry_config(), || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>("OK")
        }
    })
    .await?;

    assert_eq!(result, "OK");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    Ok(())
}

/// Test: A dropped connection on the first write is retried and recovers
#[tokio::test(start_paused = true)]
async fn test_transient_write_failure_recovers() -> Result<()> {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result = retry_with_backoff(&cache_retry_config(), || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow!("broken pipe"))
            } else {
                Ok("OK")
            }
        }
    })
    .await?;

    assert_eq!(result, "OK");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    Ok(())
}

/// Test: Writes give up after max_attempts and surface the last error
#[tokio::test(start_paused = true)]
async fn test_persistent_failure_exhausts_attempts() -> Result<()> {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result = retry_with_backoff(&cache_retry_config(), || {
        let counter = Arc::clone(&counter);
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(anyhow!("connection refused (attempt {})", n))
        }
    })
    .await;

    let error = result.expect_err("write should fail");
    assert_eq!(error.to_string(), "connection refused (attempt 3)");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    Ok(())
}

/// Test: Delays grow by the multiplier and stop at the cap
#[tokio::test(start_paused = true)]
async fn test_backoff_grows_and_is_capped() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 6,
        initial_delay_ms: 100,
        max_delay_ms: 300,
        backoff_multiplier: 2,
    };

    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = retry_with_backoff(&config, || {
        let times = Arc::clone(&times);
        async move {
            times.lock().await.push(start.elapsed());
            Err::<(), _>(anyhow!("Fail"))
        }
    })
    .await;

    let times = attempt_times.lock().await;
    assert_eq!(times.len(), 6);
    assert_eq!(times[0], Duration::ZERO);

    let expected = [100u64, 200, 300, 300, 300];
    for (i, base) in expected.iter().enumerate() {
        let delay = (times[i + 1] - times[i]).as_millis() as u64;
        assert!(
            delay >= base * 9 / 10 && delay <= base * 11 / 10 + 1,
            "delay {} was {}ms, expected about {}ms",
            i + 1,
            delay,
            base
        );
    }

    Ok(())
}

/// Test: Jitter stays within the requested spread and actually varies
#[test]
fn test_jitter_within_spread() {
    let base = Duration::from_millis(1000);

    let samples: Vec<Duration> = (0..200).map(|_| jittered(base, 0.1)).collect();

    assert!(samples.iter().all(|d| {
        *d >= Duration::from_millis(900) && *d <= Duration::from_millis(1100)
    }));
    assert!(samples.iter().any(|d| *d != samples[0]));
    assert_eq!(jittered(base, 0.0), base);
}
