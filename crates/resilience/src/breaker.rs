//! Circuit breaker guarding one platform adapter. Opens on a rolling
//! failure rate over a minimum request volume, probes recovery in
//! half-open, and fails fast while open.

use pulse_core::config::BreakerConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; requests pass through.
    Closed,
    /// Failure rate exceeded the threshold; requests are rejected.
    Open,
    /// Testing recovery; a limited number of probe requests is allowed.
    HalfOpen,
}

struct Rolling {
    state: CircuitState,
    window_started: Instant,
    opened_at: Option<Instant>,
    probes_issued: u64,
}

/// Per-adapter breaker. Counters are owned by the single adapter instance
/// and updated atomically with respect to concurrent calls; state is
/// process-local.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: parking_lot::Mutex<Rolling>,
    total: AtomicU64,
    failures: AtomicU64,
    probe_successes: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: parking_lot::Mutex::new(Rolling {
                state: CircuitState::Closed,
                window_started: Instant::now(),
                opened_at: None,
                probes_issued: 0,
            }),
            total: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            probe_successes: AtomicU64::new(0),
        }
    }

    /// Gate a call. While open, returns false until the reset timeout has
    /// elapsed, then transitions to half-open and admits probe traffic.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_secs(self.config.reset_timeout_secs) {
                    inner.state = CircuitState::HalfOpen;
                    inner.probes_issued = 1;
                    self.probe_successes.store(0, Ordering::Relaxed);
                    info!("circuit breaker transitioning to half-open");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probes_issued < self.config.half_open_probes {
                    inner.probes_issued += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful attempt.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        self.roll_window_if_due(&mut inner);
        self.total.fetch_add(1, Ordering::Relaxed);
        match inner.state {
            CircuitState::HalfOpen => {
                let probes = self.probe_successes.fetch_add(1, Ordering::Relaxed) + 1;
                if probes >= self.config.half_open_probes {
                    inner.state = CircuitState::Closed;
                    inner.opened_at = None;
                    inner.window_started = Instant::now();
                    self.total.store(0, Ordering::Relaxed);
                    self.failures.store(0, Ordering::Relaxed);
                    info!("circuit breaker closed after recovery");
                }
            }
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    /// Record a failed attempt (timeouts included). May open the circuit.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        self.roll_window_if_due(&mut inner);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;

        match inner.state {
            CircuitState::Closed => {
                if total >= self.config.volume_threshold
                    && failures * 100 > self.config.error_threshold_pct * total
                {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        failures,
                        total, "circuit breaker opened on failure rate"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any probe failure reopens and restarts the timer.
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                self.probe_successes.store(0, Ordering::Relaxed);
                warn!("circuit breaker re-opened from half-open");
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Rolling counters reset once the window lapses with the circuit
    /// closed; open/half-open accounting is driven by the reset timeout.
    fn roll_window_if_due(&self, inner: &mut Rolling) {
        if inner.state == CircuitState::Closed
            && inner.window_started.elapsed()
                >= Duration::from_secs(self.config.rolling_window_secs)
        {
            inner.window_started = Instant::now();
            self.total.store(0, Ordering::Relaxed);
            self.failures.store(0, Ordering::Relaxed);
        }
    }
}
