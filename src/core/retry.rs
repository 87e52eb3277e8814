use rand::Rng;
use std::time::Duration;

/// Jittered exponential backoff schedule for transient store and bus
/// failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration, jitter: f64) -> Self {
        let base_delay = base_delay.max(Duration::from_millis(1));
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = 2u32.saturating_pow(attempt.min(16) as u32);
        let capped = self.base_delay.saturating_mul(exp).min(self.max_delay);
        if self.jitter <= 0.0 {
            return capped;
        }
        let spread = capped.as_millis() as f64 * self.jitter;
        if spread < 1.0 {
            return capped;
        }
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        let millis = (capped.as_millis() as f64 + delta).max(0.0);
        Duration::from_millis(millis as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(100), Duration::from_secs(5), 0.2)
    }
}
