use std::time::Duration;

use conclave_types::RetryPolicy;
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// `base · backoffFactor^(attempt-1)`, ± symmetric uniform 10% jitter,
/// capped at `maxDelay` when set. `attempt` is the post-increment counter
/// (1 on the first retry), matching `RetryPolicy::should_retry`.
pub fn calculate_retry_delay(policy: &RetryPolicy, attempt: u32) -> u64 {
    let backoff_factor = policy.backoff_factor.unwrap_or(1.0);
    let exponent = attempt.saturating_sub(1) as i32;
    let raw = policy.base_delay_ms as f64 * backoff_factor.powi(exponent);

    let jitter = rand::thread_rng().gen_range(-0.1..=0.1);
    let jittered = raw * (1.0 + jitter);

    let capped = match policy.max_delay_ms {
        Some(max) => jittered.min(max as f64),
        None => jittered,
    };
    capped.max(0.0).round() as u64
}

/// Resolves after `delay_ms`; resolves to `Err(())` immediately if
/// `cancel` fires first.
pub async fn sleep_cancellable(delay_ms: u64, cancel: &CancellationToken) -> Result<(), ()> {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Ok(()),
        _ = cancel.cancelled() => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_backoff_and_respects_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1000,
            backoff_factor: Some(2.0),
            max_delay_ms: Some(3000),
        };
        // attempt=1 -> ~1000ms (±10%), well under the cap.
        let d1 = calculate_retry_delay(&policy, 1);
        assert!((900..=1100).contains(&d1));
        // attempt=4 -> 8000ms uncapped, but capped at 3000.
        let d4 = calculate_retry_delay(&policy, 4);
        assert!(d4 <= 3000);
    }

    #[tokio::test]
    async fn sleep_cancellable_returns_err_when_cancelled_first() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = sleep_cancellable(10_000, &cancel).await;
        assert!(result.is_err());
    }
}
