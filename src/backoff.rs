//! Delays between attempts of the retry loop in
//! [`ApiClient`](crate::client::ApiClient).
//!
//! The loop decides whether to try again; a [`BackoffPolicy`] decides how
//! long to wait first. The default [`ExponentialBackoff`] doubles a ceiling
//! on every retry, caps it, and sleeps a random duration below it.

use std::fmt::Debug;
use std::time::Duration;

use rand::Rng;

use crate::error::{AzureApiError, Result};

/// Decides how long to sleep before a retry.
pub trait BackoffPolicy: Send + Sync + Debug {
    /// Delay before retry number `retry`, counting from 1.
    fn delay(&self, retry: u32) -> Duration;
}

/// Doubling backoff with full jitter.
///
/// Retry `n` sleeps a uniformly random duration in
/// `[0, min(base * 2^(n-1), cap)]`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
}

impl ExponentialBackoff {
    /// First ceiling when nothing else is configured.
    pub const DEFAULT_BASE: Duration = Duration::from_secs(1);
    /// Largest ceiling when nothing else is configured.
    pub const DEFAULT_CAP: Duration = Duration::from_secs(60);

    /// Fails with `AzureApiError::Config` if `base` is zero or `cap` is
    /// below `base`.
    pub fn new(base: Duration, cap: Duration) -> Result<Self> {
        if base.is_zero() {
            return Err(AzureApiError::Config(
                "backoff base delay must be greater than zero".to_string(),
            ));
        }
        if cap < base {
            return Err(AzureApiError::Config(format!(
                "backoff cap {cap:?} is below the base delay {base:?}"
            )));
        }
        Ok(ExponentialBackoff { base, cap })
    }

    fn ceiling(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        self.base
            .checked_mul(1 << doublings)
            .map_or(self.cap, |d| d.min(self.cap))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoff {
            base: Self::DEFAULT_BASE,
            cap: Self::DEFAULT_CAP,
        }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, retry: u32) -> Duration {
        rand::rng().random_range(Duration::ZERO..=self.ceiling(retry))
    }
}

/// Retries immediately.
#[derive(Clone, Debug, Default)]
pub struct NoBackoff;

impl BackoffPolicy for NoBackoff {
    fn delay(&self, _retry: u32) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_base() {
        let err = ExponentialBackoff::new(Duration::ZERO, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, AzureApiError::Config(_)), "{err:?}");
    }

    #[test]
    fn rejects_cap_below_base() {
        let err =
            ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(5)).unwrap_err();
        assert!(err.to_string().contains("below the base delay"), "{err}");
    }

    #[test]
    fn ceiling_doubles_then_caps() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(5)).unwrap();
        assert_eq!(backoff.ceiling(1), Duration::from_secs(1));
        assert_eq!(backoff.ceiling(2), Duration::from_secs(2));
        assert_eq!(backoff.ceiling(3), Duration::from_secs(4));
        assert_eq!(backoff.ceiling(4), Duration::from_secs(5));
        assert_eq!(backoff.ceiling(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn huge_retry_count_does_not_overflow() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(u64::MAX / 2), Duration::MAX)
            .unwrap();
        assert_eq!(backoff.ceiling(40), Duration::MAX);
    }

    #[test]
    fn jittered_delay_stays_under_ceiling() {
        let backoff = ExponentialBackoff::default();
        for retry in 1..10 {
            let delay = backoff.delay(retry);
            assert!(delay <= backoff.ceiling(retry), "retry {retry}: {delay:?}");
        }
    }

    #[test]
    fn no_backoff_is_zero() {
        assert_eq!(NoBackoff.delay(3), Duration::ZERO);
    }
}
