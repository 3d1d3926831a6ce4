//! Backoff jitter strategies used after failed passes.

use std::time::Duration;

use rand::Rng;

/// Retry backoff jitter abstraction.
pub trait BackoffJitter: Send + Sync {
    /// Return a jittered delay from the exponential base delay.
    ///
    /// ```rust
    /// use instance_sync::domain::sync_scheduler::BackoffJitter;
    /// use std::time::Duration;
    ///
    /// struct FailureOffsetJitter;
    /// impl BackoffJitter for FailureOffsetJitter {
    ///     fn jittered_delay(&self, base: Duration, failures: u32) -> Duration {
    ///         base + Duration::from_millis(u64::from(failures) * 5)
    ///     }
    /// }
    /// let delay = FailureOffsetJitter.jittered_delay(Duration::from_millis(100), 2);
    /// assert_eq!(delay, Duration::from_millis(110));
    /// ```
    fn jittered_delay(&self, base: Duration, failures: u32) -> Duration;
}

/// Adds up to a quarter of the base delay, drawn uniformly.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl BackoffJitter for RandomJitter {
    fn jittered_delay(&self, base: Duration, _failures: u32) -> Duration {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = (base_ms / 4).max(1);
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_secs(60))]
    #[case(Duration::from_millis(3))]
    fn random_jitter_stays_within_a_quarter_of_base(#[case] base: Duration) {
        for failures in 1..20 {
            let delay = RandomJitter.jittered_delay(base, failures);
            assert!(delay >= base);
            assert!(delay <= base + (base / 4).max(Duration::from_millis(1)));
        }
    }
}
