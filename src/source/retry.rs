//! Bounded retry with a fixed delay.

use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio::time::sleep;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Statuses that abort immediately instead of being retried.
    pub short_circuit_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
            short_circuit_statuses: vec![502],
        }
    }
}

impl RetryPolicy {
    /// Whether `err` is worth another attempt under this policy.
    pub fn is_retryable(&self, err: &FetchError) -> bool {
        match err.status() {
            Some(status) => !self.short_circuit_statuses.contains(&status),
            None => true,
        }
    }

    /// Runs `op` until it succeeds, fails with a short-circuit status,
    /// or `max_attempts` is exhausted.  Returns the last error.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !self.is_retryable(&e) => {
                    warn!("{} - not retrying {}", e, label);
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        "Request for {} failed after {} attempts: {}",
                        label, attempt, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}...",
                        attempt, self.max_attempts, label, e, self.delay
                    );
                    attempt += 1;
                    sleep(self.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn status(status: u16) -> FetchError {
        FetchError::Status {
            url: "http://api/endpoints".into(),
            status,
        }
    }

    fn transport() -> FetchError {
        FetchError::Transport {
            url: "http://api/endpoints".into(),
            reason: "connection refused".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_use_every_attempt() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let result: Result<(), _> = policy
            .run("endpoints", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(status(500))
            })
            .await;

        assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_circuit_status_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = policy
            .run("endpoints", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(status(502))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_millis(100),
            short_circuit_statuses: Vec::new(),
        };
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = policy
            .run("endpoints", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transport())
                } else {
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_classification() {
        let policy = RetryPolicy {
            short_circuit_statuses: vec![502, 503],
            ..RetryPolicy::default()
        };

        assert!(policy.is_retryable(&transport()));
        assert!(policy.is_retryable(&status(500)));
        assert!(!policy.is_retryable(&status(503)));
    }
}
