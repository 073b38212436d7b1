//! Retry backoff policy.

use std::time::Duration;

use rand::Rng;

/// Shared backoff policy for generation retries.
///
/// Transport and rate-limit failures wait an exponentially growing, jittered
/// delay; validation failures use a short fixed pause instead, since waiting
/// longer does nothing for a model that produced malformed output.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Upper bound on the computed delay.
    pub max: Duration,
    /// Fixed pause after a validation failure.
    pub parse_retry: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            multiplier: 2.0,
            max: Duration::from_secs(30),
            parse_retry: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before retrying after the given failed attempt
    /// (1-based).
    ///
    /// The exponential value is capped at `max`, then jittered into the range
    /// `[capped / 2, capped]` so a burst of throttled workers does not retry
    /// in lockstep.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self.base.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = raw.min(self.max.as_secs_f64());
        let jittered = rand::thread_rng().gen_range(capped / 2.0..=capped.max(f64::MIN_POSITIVE));
        Duration::from_secs_f64(jittered)
    }
}
