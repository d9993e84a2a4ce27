//! Upstream circuit breaker driven by the injectable [`Clock`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use time::OffsetDateTime;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    probe_at: Option<OffsetDateTime>,
}

/// Shared by every call one adapter makes.
///
/// Transport failures and non-2xx statuses (other than 404) count as
/// failures. An empty but well-formed upstream answer is a success.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    breaker: Mutex<Breaker>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            breaker: Mutex::new(Breaker {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Breaker> {
        self.breaker
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }

    /// `Ok` when a call may go out. While open, returns how long until the
    /// half-open probe is allowed; the first caller after that becomes the
    /// probe.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut breaker = self.lock();
        if breaker.state != CircuitState::Open {
            return Ok(());
        }

        let now = self.clock.now_utc();
        match breaker.probe_at {
            Some(probe_at) if now < probe_at => {
                Err(Duration::try_from(probe_at - now).unwrap_or_default())
            }
            _ => {
                tracing::info!("upstream circuit breaker half-open, sending probe");
                breaker.state = CircuitState::HalfOpen;
                breaker.probe_at = None;
                Ok(())
            }
        }
    }

    pub fn record_success(&self) {
        let mut breaker = self.lock();
        if breaker.state != CircuitState::Closed {
            tracing::info!("upstream circuit breaker closed");
        }
        breaker.state = CircuitState::Closed;
        breaker.consecutive_failures = 0;
        breaker.probe_at = None;
    }

    pub fn record_failure(&self) {
        let mut breaker = self.lock();
        breaker.consecutive_failures = breaker.consecutive_failures.saturating_add(1);

        let trips = breaker.state == CircuitState::HalfOpen
            || breaker.consecutive_failures >= self.config.failure_threshold;
        if !trips {
            return;
        }

        if breaker.state != CircuitState::Open {
            tracing::warn!(
                failures = breaker.consecutive_failures,
                cooldown_secs = self.config.open_timeout.as_secs(),
                "upstream circuit breaker opened"
            );
        }
        breaker.state = CircuitState::Open;
        breaker.probe_at = Some(self.clock.now_utc() + self.config.open_timeout);
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }
}
