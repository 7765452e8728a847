//! Exponential backoff with jitter and a per-identifier circuit breaker.
//!
//! Applies to the unreliable lanes and to coordinator calls; the core
//! stream-transfer loop never retries frames (the transport does).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;

use crate::constants::{
    BACKOFF_MULTIPLIER, BASE_BACKOFF, JITTER_FACTOR, MAX_BACKOFF, MAX_RETRIES,
};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

#[derive(Default)]
struct RetryState {
    failures: HashMap<String, u32>,
    circuits: HashMap<String, CircuitState>,
}

/// Retry policy with per-identifier failure tracking.
pub struct RetryManager {
    max_retries: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter: f64,
    state: Mutex<RetryState>,
}

impl RetryManager {
    /// Create a manager with the default policy (5 retries, 100 ms base,
    /// 30 s cap, x2 growth, +/-10% jitter).
    pub fn new() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_backoff: BASE_BACKOFF,
            max_backoff: MAX_BACKOFF,
            multiplier: BACKOFF_MULTIPLIER,
            jitter: JITTER_FACTOR,
            state: Mutex::new(RetryState::default()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether another attempt should be made after `attempt` tries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Backoff before the given attempt (1-based), floored by the measured
    /// RTT when available.
    pub fn next_backoff(&self, attempt: u32, rtt: Option<Duration>) -> Duration {
        let attempt = attempt.max(1);
        let mut backoff =
            self.base_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        if let Some(rtt) = rtt {
            backoff = backoff.max(rtt.as_secs_f64());
        }
        backoff = backoff.min(self.max_backoff.as_secs_f64());

        let jitter = backoff * self.jitter * rand::thread_rng().gen_range(-1.0..=1.0);
        backoff = (backoff + jitter).max(self.base_backoff.as_secs_f64());

        Duration::from_secs_f64(backoff)
    }

    /// Reset the failure count and close the circuit for `id`.
    pub fn record_success(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.failures.remove(id);
        state.circuits.insert(id.to_string(), CircuitState::Closed);
    }

    /// Count a failure; beyond the retry cap the circuit opens.
    pub fn record_failure(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        let count = state.failures.entry(id.to_string()).or_insert(0);
        *count += 1;
        if *count > self.max_retries {
            state.circuits.insert(id.to_string(), CircuitState::Open);
        }
    }

    /// Current circuit state for `id` (closed when never seen).
    pub fn circuit_state(&self, id: &str) -> CircuitState {
        let state = self.state.lock().unwrap();
        state.circuits.get(id).copied().unwrap_or_default()
    }
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new()
    }
}
