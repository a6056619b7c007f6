//! Reconnection policy: when, if at all, to try again after a transport failure.

use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_JITTER: f64 = 0.2;

/// Exponential backoff with a ceiling.
///
/// [`next_delay`](Self::next_delay) is a pure function of its arguments. Jitter
/// is applied separately by the caller through [`jittered`](Self::jittered) so
/// the schedule itself stays deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Relative spread applied around each delay, within `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: DEFAULT_JITTER,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is the number of consecutive failed attempts, including the
    /// one that just happened. The first retry waits `base_delay`, each
    /// following one doubles it, and no delay exceeds `max_delay`.
    pub fn next_delay(&self, attempt: u32, max_retries: u32) -> Option<Duration> {
        if attempt >= max_retries {
            return None;
        }
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        Some(delay.min(self.max_delay))
    }

    /// Spreads `delay` by up to `±jitter`. `unit` is a sample from `0.0..1.0`.
    pub fn jittered(&self, delay: Duration, unit: f64) -> Duration {
        let spread = self.jitter.clamp(0.0, 1.0) * (2.0 * unit.clamp(0.0, 1.0) - 1.0);
        delay.mul_f64(1.0 + spread)
    }
}
