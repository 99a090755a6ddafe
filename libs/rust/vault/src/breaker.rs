//! Circuit breaker guarding calls to the Vault server.
//!
//! Consecutive retryable failures open the circuit; after the reset timeout
//! a bounded number of concurrent trial requests is let through (half-open)
//! and enough successes close it again.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected without reaching Vault
    Open,
    /// Limited trial requests are allowed to test recovery
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes needed to close the circuit
    pub success_threshold: u32,
    /// Time spent open before trying again
    pub reset_timeout: Duration,
    /// Trial requests allowed while half-open
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
            half_open_max_requests: 3,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    in_flight: u32,
    opened_at: Option<Instant>,
}

/// Circuit breaker shared by all requests of a client.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    #[must_use]
    pub const fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                in_flight: 0,
                opened_at: None,
            }),
        }
    }

    /// Whether a request may proceed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map_or(Duration::ZERO, |t| t.elapsed());
                if elapsed < self.config.reset_timeout {
                    return false;
                }
                debug!("Vault circuit half-open");
                inner.state = CircuitState::HalfOpen;
                inner.successes = 0;
                inner.in_flight = 1;
                true
            }
            CircuitState::HalfOpen => {
                if inner.in_flight >= self.config.half_open_max_requests {
                    return false;
                }
                inner.in_flight += 1;
                true
            }
        }
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.in_flight = inner.in_flight.saturating_sub(1);
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    debug!("Vault circuit closed");
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.in_flight = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
    }

    /// Give back an admitted request that reached no verdict, such as one
    /// that failed before anything was sent.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failures += 1;
        let trip = match inner.state {
            CircuitState::Closed => inner.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            warn!(failures = inner.failures, "Vault circuit opened");
            inner.state = CircuitState::Open;
            inner.successes = 0;
            inner.in_flight = 0;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            success_threshold: 2,
            reset_timeout: reset,
            half_open_max_requests: 2,
        })
    }

    #[test]
    fn test_initial_state_closed() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(3, Duration::from_secs(60));
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = breaker(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_limits_trials_and_closes() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow_request());
        assert!(!cb.allow_request());

        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure();
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_released_trials_free_their_slot() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure();
        for _ in 0..10 {
            assert!(cb.allow_request());
            cb.release();
        }
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow_request());
        assert!(cb.allow_request());
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_completed_trials_admit_more() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 3,
            reset_timeout: Duration::ZERO,
            half_open_max_requests: 1,
        });
        cb.record_failure();
        for _ in 0..3 {
            assert!(cb.allow_request());
            assert!(!cb.allow_request());
            cb.record_success();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
