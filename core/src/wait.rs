//! Bounded polling
//!
//! Explicit retry-until-timeout helper used by window focus waits and
//! workspace/file-open reconciliation. Each failed attempt sleeps the
//! full interval; the loop ends only on success or timeout expiry.

use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Poll `attempt` until it returns true or `timeout` elapses.
///
/// The first attempt runs immediately. Returns whether the final
/// attempt succeeded.
pub async fn poll_until<F>(mut attempt: F, interval: Duration, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if attempt() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let ok = poll_until(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                true
            },
            Duration::from_secs(60),
            Duration::from_secs(600),
        )
        .await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let ok = poll_until(
            move || c.fetch_add(1, Ordering::SeqCst) >= 2,
            Duration::from_millis(500),
            Duration::from_secs(15),
        )
        .await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let ok = poll_until(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                false
            },
            Duration::from_millis(500),
            Duration::from_secs(2),
        )
        .await;
        assert!(!ok);
        // 2s budget at 500ms per attempt: initial try plus four sleeps
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
