//! Reconnection configuration and exponential backoff.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
///
/// There is no attempt limit: the supervisor retries until it
/// is shut down.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Random spread applied to each delay, as a fraction in `[0, 1]`.
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = calculate_backoff(
            attempt,
            self.initial_delay,
            self.max_delay,
            self.backoff_multiplier,
        );
        if self.jitter <= 0.0 {
            return base;
        }

        let spread = self.jitter.min(1.0);
        let factor = rand::thread_rng().gen_range((1.0 - spread)..=(1.0 + spread));
        base.mul_f64(factor).min(self.max_delay)
    }
}

/// Calculate reconnection delay using exponential backoff.
#[must_use]
pub fn calculate_backoff(
    attempt: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let factor = multiplier.powi(exponent);
    let delay_millis = initial_delay.as_millis() as f64 * factor;
    if !delay_millis.is_finite() || delay_millis >= max_delay.as_millis() as f64 {
        return max_delay;
    }
    Duration::from_millis(delay_millis as u64).min(max_delay)
}
