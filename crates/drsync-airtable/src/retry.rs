//! Retry with exponential back-off and jitter for store writes.
//!
//! [`retry_with_backoff`] wraps any fallible async store call and retries on
//! transient errors (network failures, 429, 5xx). Everything else is returned
//! at once so a bad payload fails its batch on the first try.
//!
//! Creates are not idempotent: a timed-out or 5xx `POST` may already have
//! been committed, so those calls only retry errors that prove the request
//! was never processed (see [`is_retriable_create`]).

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - [`StoreError::RateLimited`]: the store asked us to slow down.
/// - [`StoreError::Rejected`] with a 5xx status.
///
/// **Not retriable:** 4xx rejections (bad field names, bad values),
/// deserialization failures and configuration errors.
pub(crate) fn is_retriable(err: &StoreError) -> bool {
    match err {
        StoreError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        StoreError::RateLimited => true,
        StoreError::Rejected { status, .. } => *status >= 500,
        StoreError::Deserialize { .. } | StoreError::InvalidBaseUrl { .. } => false,
    }
}

/// Subset of [`is_retriable`] for non-idempotent creates: only a 429 or a
/// failed connection guarantee the store never saw the write.
pub(crate) fn is_retriable_create(err: &StoreError) -> bool {
    match err {
        StoreError::Http(e) => e.is_connect(),
        StoreError::RateLimited => true,
        StoreError::Rejected { .. }
        | StoreError::Deserialize { .. }
        | StoreError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// With `idempotent == false` only [`is_retriable_create`] errors are retried.
/// The delay before retry `n` is `backoff_base_ms × 2ⁿ⁻¹` with ±25 % jitter,
/// capped at 30 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    idempotent: bool,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retriable = if idempotent {
                    is_retriable(&err)
                } else {
                    is_retriable_create(&err)
                };
                if !retriable || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "store transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn deserialize_err() -> StoreError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        StoreError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    fn rejected(status: u16) -> StoreError {
        StoreError::Rejected {
            status,
            body: "{}".to_owned(),
        }
    }

    #[test]
    fn client_rejection_is_not_retriable() {
        assert!(!is_retriable(&rejected(422)));
        assert!(!is_retriable(&rejected(404)));
    }

    #[test]
    fn server_rejection_and_rate_limit_are_retriable() {
        assert!(is_retriable(&rejected(503)));
        assert!(is_retriable(&StoreError::RateLimited));
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        assert!(!is_retriable(&deserialize_err()));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, true, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, StoreError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_unprocessable_payload() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, true, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(rejected(422))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "422 must not be retried");
        assert!(matches!(
            result,
            Err(StoreError::Rejected { status: 422, .. })
        ));
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, true, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err::<u32, _>(StoreError::RateLimited)
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99, "should succeed after retries");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, true, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(rejected(500))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 try + 2 retries");
        assert!(matches!(
            result,
            Err(StoreError::Rejected { status: 500, .. })
        ));
    }

    #[test]
    fn create_only_retries_unprocessed_requests() {
        assert!(is_retriable_create(&StoreError::RateLimited));
        assert!(!is_retriable_create(&rejected(503)));
        assert!(!is_retriable_create(&rejected(422)));
    }

    #[tokio::test]
    async fn non_idempotent_call_is_not_replayed_after_server_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, false, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(rejected(502))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(StoreError::Rejected { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn non_idempotent_call_still_retries_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, false, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 2 {
                    Err::<u32, _>(StoreError::RateLimited)
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
