use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry `op` up to `max_attempts` times with exponential backoff, used by
/// `HistoricalDataManager` chunk fetches and any HTTP call made through an
/// `ExchangeClient` implementation (spec §5: "automatic retry with
/// exponential backoff (max 5 attempts) for rate-limit and transient
/// network errors").
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut should_retry: impl FnMut(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && should_retry(&err) => {
                let delay = base_delay * 2u32.pow(attempt - 1);
                warn!(attempt, %err, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &'static str> = retry_with_backoff(
            5,
            Duration::from_millis(1),
            |_| true,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let result: Result<u32, &'static str> =
            retry_with_backoff(3, Duration::from_millis(1), |_| true, || async { Err("down") }).await;
        assert_eq!(result, Err("down"));
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &'static str> = retry_with_backoff(
            5,
            Duration::from_millis(1),
            |_| false,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent") }
            },
        )
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
