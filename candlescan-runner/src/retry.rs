//! Exponential backoff with optional jitter and cancellable sleeps.

use crate::config::RetryConfig;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Slice length for cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Retry schedule for one symbol's fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// No waiting between attempts. Used by tests and offline fakes.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based), without jitter:
    /// `base * multiplier^(retry - 1)`, capped at `max_delay`.
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay before retry number `retry`, jittered by ±25% when enabled.
    pub fn delay(&self, retry: u32, rng: &mut impl Rng) -> Duration {
        let nominal = self.nominal_delay(retry);
        if !self.jitter || nominal.is_zero() {
            return nominal;
        }
        nominal.mul_f64(rng.gen_range(0.75..=1.25))
    }
}

/// Sleep for `duration`, waking early if `cancel` is raised.
///
/// Returns `false` when the sleep was interrupted by cancellation.
pub fn sleep_cancellable(duration: Duration, cancel: Option<&AtomicBool>) -> bool {
    let is_cancelled = || cancel.is_some_and(|f| f.load(Ordering::Relaxed));
    if is_cancelled() {
        return false;
    }
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        if is_cancelled() {
            return false;
        }
    }
}
