//! Circuit breaker for price source rate limiting and IP bans.
//!
//! When the source returns HTTP 403 (IP ban), or requests for several distinct
//! symbols fail in a row, the breaker trips and refuses all subsequent requests
//! for a cooldown period (default 30 minutes). Fetch workers share one breaker,
//! so a trip fails the rest of the batch fast instead of hammering the source.
//!
//! Failures are keyed by symbol: retries of one bad symbol count once, so a
//! single unreachable ticker never locks out the rest of the watchlist.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation: requests are allowed.
    Closed,
    /// Tripped: all requests are refused until cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    /// Symbols that failed since the last success.
    failing: HashSet<String>,
}

/// Circuit breaker shared by all fetch workers of a provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    /// Create a breaker that trips once `failure_threshold` distinct symbols
    /// have failed without an intervening success.
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failing: HashSet::new(),
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Default breaker: 30-minute cooldown, trips after 3 failing symbols.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    // Breaker state stays meaningful even if a worker panicked mid-update.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check if requests are currently allowed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.failing.clear();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request: forgets every failing symbol.
    pub fn record_success(&self) {
        self.lock().failing.clear();
    }

    /// Record a failed request for `symbol`. Reaching the threshold of
    /// distinct failing symbols trips the breaker.
    pub fn record_failure(&self, symbol: &str) {
        let mut inner = self.lock();
        if !inner.failing.contains(symbol) {
            inner.failing.insert(symbol.to_string());
        }
        if inner.failing.len() >= self.failure_threshold as usize
            && inner.state == BreakerState::Closed
        {
            warn!(
                symbols = inner.failing.len(),
                "circuit breaker tripped after failures across symbols"
            );
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Immediately trip the breaker (for 403 Forbidden / IP ban).
    pub fn trip(&self) {
        warn!("circuit breaker tripped: provider refused access");
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    /// Remaining cooldown time (zero if not tripped).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        assert!(cb.is_allowed());
        assert_eq!(cb.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn trips_after_threshold_symbols() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        cb.record_failure("AAA");
        cb.record_failure("BBB");
        assert!(cb.is_allowed());
        cb.record_failure("CCC");
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn repeated_failures_of_one_symbol_count_once() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        for _ in 0..10 {
            cb.record_failure("XXXX");
        }
        assert!(cb.is_allowed());
        cb.record_failure("YYYY");
        assert!(cb.is_allowed());
    }

    #[test]
    fn immediate_trip() {
        let cb = CircuitBreaker::default_provider();
        cb.trip();
        assert!(!cb.is_allowed());
    }

    #[test]
    fn success_resets_counter() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        cb.record_failure("AAA");
        cb.record_failure("BBB");
        cb.record_success();
        cb.record_failure("CCC");
        assert!(cb.is_allowed());
    }

    #[test]
    fn expires_after_cooldown() {
        let cb = CircuitBreaker::new(Duration::from_millis(10), 3);
        cb.trip();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.is_allowed());
    }
}
