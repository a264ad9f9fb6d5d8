//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for update fetching.
//! When the messaging transport fails repeatedly, the poll loop stops asking
//! for a while instead of hammering a provider that is down or rate limiting.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::RecoveryConfig;

/// Circuit breaker for the update fetch
///
/// # State Machine
///
/// - **Closed**: Normal operation, every tick fetches
/// - **Open**: Failure threshold exceeded, ticks are skipped
/// - **Half-Open**: Reset window elapsed, the next fetch decides
///
/// # Configuration
///
/// Uses `RecoveryConfig` for:
/// - `circuit_breaker_threshold`: Failures before opening (default: 5)
/// - `circuit_breaker_reset_secs`: Time before attempting reset (default: 60s)
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: Mutex<u32>,
    last_failure_time: Mutex<Option<Instant>>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// ```rust
    /// use teleshop::config::RecoveryConfig;
    /// use teleshop::circuit_breaker::CircuitBreaker;
    ///
    /// let circuit_breaker = CircuitBreaker::new(RecoveryConfig::default());
    /// assert!(!circuit_breaker.is_open());
    /// ```
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            failure_count: Mutex::new(0),
            last_failure_time: Mutex::new(None),
            config,
        }
    }

    /// Check if the circuit is open (ticks should skip fetching)
    ///
    /// Automatically resets to closed once the reset window has elapsed.
    pub fn is_open(&self) -> bool {
        let mut failure_count = lock(&self.failure_count);
        let mut last_failure = lock(&self.last_failure_time);

        if *failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = *last_failure {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs)
                {
                    return true;
                }
                *failure_count = 0;
                *last_failure = None;
            }
        }
        false
    }

    /// Record a failed fetch
    pub fn record_failure(&self) {
        *lock(&self.failure_count) += 1;
        *lock(&self.last_failure_time) = Some(Instant::now());
    }

    /// Record a successful fetch, closing the circuit
    pub fn record_success(&self) {
        *lock(&self.failure_count) = 0;
        *lock(&self.last_failure_time) = None;
    }

    /// Number of consecutive failures seen so far
    pub fn failure_count(&self) -> u32 {
        *lock(&self.failure_count)
    }

    /// Delay before the next attempt: exponential in the failure count, capped,
    /// with up to 20% random jitter so restarts don't line up
    pub fn retry_delay(&self) -> Duration {
        let failures = self.failure_count();
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = failures.saturating_sub(1).min(16);
        let base = self
            .config
            .base_retry_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.max_retry_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=base / 5);
        Duration::from_millis(base.saturating_add(jitter).min(self.config.max_retry_delay_ms))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_failure_recording() {
        let config = RecoveryConfig {
            circuit_breaker_threshold: 2,
            ..Default::default()
        };
        let circuit_breaker = CircuitBreaker::new(config);

        assert!(!circuit_breaker.is_open());

        circuit_breaker.record_failure();
        assert!(!circuit_breaker.is_open());

        circuit_breaker.record_failure();
        assert!(circuit_breaker.is_open());
    }

    #[test]
    fn test_circuit_breaker_success_recording() {
        let config = RecoveryConfig {
            circuit_breaker_threshold: 1,
            ..Default::default()
        };
        let circuit_breaker = CircuitBreaker::new(config);

        circuit_breaker.record_failure();
        assert!(circuit_breaker.is_open());

        circuit_breaker.record_success();
        assert!(!circuit_breaker.is_open());
        assert_eq!(circuit_breaker.failure_count(), 0);
    }

    #[test]
    fn test_circuit_breaker_resets_after_window() {
        let config = RecoveryConfig {
            circuit_breaker_threshold: 1,
            circuit_breaker_reset_secs: 0,
            ..Default::default()
        };
        let circuit_breaker = CircuitBreaker::new(config);

        circuit_breaker.record_failure();
        // A zero-second window has already elapsed
        assert!(!circuit_breaker.is_open());
        assert_eq!(circuit_breaker.failure_count(), 0);
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let config = RecoveryConfig {
            base_retry_delay_ms: 1000,
            max_retry_delay_ms: 4000,
            circuit_breaker_threshold: 100,
            ..Default::default()
        };
        let circuit_breaker = CircuitBreaker::new(config);
        assert_eq!(circuit_breaker.retry_delay(), Duration::ZERO);

        circuit_breaker.record_failure();
        let first = circuit_breaker.retry_delay();
        assert!(first >= Duration::from_millis(1000));
        assert!(first <= Duration::from_millis(1200));

        for _ in 0..10 {
            circuit_breaker.record_failure();
        }
        assert!(circuit_breaker.retry_delay() <= Duration::from_millis(4000));
    }
}
