/*
[INPUT]:  Retry attempt count, backoff configuration
[OUTPUT]: Delay before the next reconnect attempt
[POS]:    Connection layer - reconnection backoff policy
[UPDATE]: When changing backoff shape, jitter, or retry limits
*/

use std::time::Duration;

use rand::Rng;
use tickstream_adapter::{Result, StreamError};

/// How many retries may follow an abnormal disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    Limited(u32),
    Unbounded,
}

impl RetryLimit {
    /// Configuration surface mapping: `0` means unbounded.
    pub fn from_max_attempts(max_attempts: u32) -> Self {
        if max_attempts == 0 {
            RetryLimit::Unbounded
        } else {
            RetryLimit::Limited(max_attempts)
        }
    }

    pub fn allows(self, attempt: u32) -> bool {
        match self {
            RetryLimit::Limited(max) => attempt < max,
            RetryLimit::Unbounded => true,
        }
    }

    pub fn max_attempts(self) -> Option<u32> {
        match self {
            RetryLimit::Limited(max) => Some(max),
            RetryLimit::Unbounded => None,
        }
    }
}

/// Exponential backoff with a cap and additive uniform jitter.
#[derive(Debug, Clone)]
pub struct ReconnectionPolicy {
    base_delay: Duration,
    max_delay: Duration,
    jitter_span: Duration,
    limit: RetryLimit,
}

impl ReconnectionPolicy {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        jitter_span: Duration,
        limit: RetryLimit,
    ) -> Result<Self> {
        if base_delay.is_zero() {
            return Err(StreamError::Config(
                "base delay must be greater than zero".to_string(),
            ));
        }
        if max_delay < base_delay {
            return Err(StreamError::Config(format!(
                "max delay {max_delay:?} is below base delay {base_delay:?}"
            )));
        }
        Ok(Self {
            base_delay,
            max_delay,
            jitter_span,
            limit,
        })
    }

    pub fn limit(&self) -> RetryLimit {
        self.limit
    }

    pub fn jitter_span(&self) -> Duration {
        self.jitter_span
    }

    /// Whether a retry may be scheduled after `attempt` retries have already been made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.limit.allows(attempt)
    }

    /// `base * 2^attempt`, capped at the max delay. No jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
        let max_ms = self.max_delay.as_millis().min(u64::MAX as u128) as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    /// Backoff plus jitter in `[0, jitter_span)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let span_ms = self.jitter_span.as_millis().min(u64::MAX as u128) as u64;
        let jitter_ms = if span_ms == 0 {
            0
        } else {
            rng.gen_range(0..span_ms)
        };
        self.backoff(attempt) + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    fn policy() -> ReconnectionPolicy {
        ReconnectionPolicy::new(
            Duration::from_millis(1_000),
            Duration::from_millis(30_000),
            Duration::from_millis(1_000),
            RetryLimit::Limited(5),
        )
        .unwrap()
    }

    #[test]
    fn backoff_clamps_at_max_delay() {
        let policy = policy();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(16));
        assert_eq!(policy.backoff(5), Duration::from_secs(30));
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
        assert_eq!(policy.backoff(200), Duration::from_secs(30));
    }

    #[rstest]
    #[case(0, 1_000, 2_000)]
    #[case(1, 2_000, 3_000)]
    #[case(3, 8_000, 9_000)]
    #[case(10, 30_000, 31_000)]
    #[case(64, 30_000, 31_000)]
    fn delay_stays_in_jitter_window(#[case] attempt: u32, #[case] low: u64, #[case] high: u64) {
        let policy = policy();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let delay = policy.delay_with_rng(attempt, &mut rng);
            assert!(delay >= Duration::from_millis(low), "{delay:?} < {low}ms");
            assert!(delay < Duration::from_millis(high), "{delay:?} >= {high}ms");
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = ReconnectionPolicy::new(
            Duration::from_millis(250),
            Duration::from_millis(1_000),
            Duration::ZERO,
            RetryLimit::Unbounded,
        )
        .unwrap();
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(9), Duration::from_millis(1_000));
    }

    #[test]
    fn retry_limit_is_explicit() {
        assert_eq!(RetryLimit::from_max_attempts(0), RetryLimit::Unbounded);
        assert_eq!(RetryLimit::from_max_attempts(2), RetryLimit::Limited(2));

        let limited = RetryLimit::Limited(2);
        assert!(limited.allows(0));
        assert!(limited.allows(1));
        assert!(!limited.allows(2));
        assert!(RetryLimit::Unbounded.allows(u32::MAX));
        assert_eq!(RetryLimit::Unbounded.max_attempts(), None);
    }

    #[test]
    fn rejects_invalid_delays() {
        let zero_base = ReconnectionPolicy::new(
            Duration::ZERO,
            Duration::from_secs(1),
            Duration::ZERO,
            RetryLimit::Unbounded,
        );
        assert!(zero_base.is_err());

        let inverted = ReconnectionPolicy::new(
            Duration::from_secs(5),
            Duration::from_secs(1),
            Duration::ZERO,
            RetryLimit::Unbounded,
        );
        assert!(inverted.is_err());
    }
}
