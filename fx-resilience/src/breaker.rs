//! Circuit breaker guarding the upstream provider.
//!
//! Implements the circuit breaker pattern to stop amplifying load on a
//! failing upstream. The circuit has three states:
//!
//! - **Closed**: Normal operation, calls go through.
//! - **Open**: Upstream is failing, calls fail fast with [`FxError::CircuitOpen`].
//! - **HalfOpen**: One trial call tests whether the upstream recovered.
//!
//! ```text
//! Closed   -> Open     : failure_threshold consecutive upstream failures
//! Open     -> HalfOpen : first call after break_duration
//! HalfOpen -> Closed   : trial call succeeds
//! HalfOpen -> Open     : trial call fails (timer restarts)
//! ```
//!
//! Only one trial runs at a time; callers arriving while it is in flight
//! fail fast instead of waiting. Outcomes are reported through a
//! [`CallPermit`], so an admitted call that never reaches the upstream (a
//! cache hit) leaves the accounting untouched. The state is in-memory and
//! resets when the process restarts.

use std::borrow::Cow;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use fx_types::FxError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time the circuit stays open before allowing a trial call.
const DEFAULT_BREAK_DURATION: Duration = Duration::from_secs(60);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    /// Normal operation - calls are allowed.
    Closed,
    /// Upstream is failing - calls are rejected.
    Open,
    /// Testing recovery - a single trial call is allowed.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive upstream failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to stay open before admitting a trial call.
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            break_duration: DEFAULT_BREAK_DURATION,
        }
    }
}

/// Point-in-time view of the circuit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CircuitStatus {
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Observer notified of every state change as `(from, to)`.
pub type TransitionListener = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    /// When the circuit last opened.
    opened_at: Option<Instant>,
    /// Whether the HalfOpen trial permit is handed out.
    trial_in_flight: bool,
    /// Bumped on every transition; permits from older generations are stale.
    generation: u64,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            generation: 0,
        }
    }

    fn transition(&mut self, to: CircuitState) -> (CircuitState, CircuitState) {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.trial_in_flight = false;
        match to {
            CircuitState::Open => self.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.opened_at = None;
            }
            CircuitState::HalfOpen => {}
        }
        (from, to)
    }
}

/// Process-wide breaker for one upstream.
///
/// Construct once and share it (e.g. behind an `Arc`) between every caller
/// of the upstream; state lives as long as the instance.
pub struct CircuitBreaker {
    name: Cow<'static, str>,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    listener: Option<TransitionListener>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<Cow<'static, str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            circuit: Mutex::new(Circuit::new()),
            listener: None,
        }
    }

    /// Registers an observer for state transitions.
    pub fn with_listener(mut self, listener: TransitionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Lock the circuit, recovering from poison.
    ///
    /// Every critical section leaves the circuit consistent, so the state
    /// behind a poisoned lock is still usable.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!(breaker = %self.name, "circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Admits a call or fails fast.
    ///
    /// Moves Open to HalfOpen once the break duration has elapsed and hands
    /// the single trial permit to this caller.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, FxError> {
        let mut circuit = self.lock_circuit();

        let (trial, transition) = match circuit.state {
            CircuitState::Closed => (false, None),
            CircuitState::HalfOpen if circuit.trial_in_flight => {
                debug!(breaker = %self.name, "trial call in flight, rejecting");
                return Err(FxError::CircuitOpen {
                    retry_after: Duration::ZERO,
                });
            }
            CircuitState::HalfOpen => {
                circuit.trial_in_flight = true;
                (true, None)
            }
            CircuitState::Open => {
                let elapsed = circuit
                    .opened_at
                    .map(|opened_at| opened_at.elapsed())
                    .unwrap_or(self.config.break_duration);
                if elapsed < self.config.break_duration {
                    return Err(FxError::CircuitOpen {
                        retry_after: self.config.break_duration - elapsed,
                    });
                }
                let transition = circuit.transition(CircuitState::HalfOpen);
                circuit.trial_in_flight = true;
                (true, Some(transition))
            }
        };

        let permit = CallPermit {
            breaker: self,
            generation: circuit.generation,
            trial,
            settled: false,
        };
        drop(circuit);

        if let Some((from, to)) = transition {
            self.notify(from, to);
        }
        Ok(permit)
    }

    /// Runs `op` under the breaker and records its outcome.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, FxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FxError>>,
    {
        let permit = self.try_acquire()?;
        let result = op().await;
        permit.record(&result);
        result
    }

    pub fn state(&self) -> CircuitState {
        self.lock_circuit().state
    }

    pub fn status(&self) -> CircuitStatus {
        let circuit = self.lock_circuit();
        CircuitStatus {
            state: circuit.state,
            consecutive_failures: circuit.consecutive_failures,
        }
    }

    fn on_success(&self, generation: u64, trial: bool) {
        let mut circuit = self.lock_circuit();
        if circuit.generation != generation {
            debug!(breaker = %self.name, "ignoring stale success");
            return;
        }

        let transition = match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen if trial => Some(circuit.transition(CircuitState::Closed)),
            _ => None,
        };
        drop(circuit);

        if let Some((from, to)) = transition {
            info!(breaker = %self.name, "trial call succeeded, circuit closed");
            self.notify(from, to);
        }
    }

    fn on_failure(&self, generation: u64, trial: bool) {
        let mut circuit = self.lock_circuit();
        if circuit.generation != generation {
            debug!(breaker = %self.name, "ignoring stale failure");
            return;
        }

        let transition = match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = circuit.consecutive_failures,
                        break_secs = self.config.break_duration.as_secs(),
                        "circuit opened"
                    );
                    Some(circuit.transition(CircuitState::Open))
                } else {
                    debug!(
                        breaker = %self.name,
                        failures = circuit.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "upstream failure recorded"
                    );
                    None
                }
            }
            CircuitState::HalfOpen if trial => {
                warn!(breaker = %self.name, "trial call failed, circuit reopened");
                Some(circuit.transition(CircuitState::Open))
            }
            _ => None,
        };
        drop(circuit);

        if let Some((from, to)) = transition {
            self.notify(from, to);
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut circuit = self.lock_circuit();
        if circuit.generation == generation && circuit.state == CircuitState::HalfOpen {
            circuit.trial_in_flight = false;
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        if to == CircuitState::HalfOpen {
            info!(breaker = %self.name, "break elapsed, admitting trial call");
        }
        if let Some(listener) = &self.listener {
            listener(from, to);
        }
    }
}

/// Admission ticket for one guarded call.
///
/// Report the outcome with [`record`](Self::record). Dropping the permit
/// without recording counts as neither success nor failure and frees the
/// HalfOpen trial slot if this permit held it.
#[must_use = "record the call outcome or drop the permit explicitly"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this permit is the HalfOpen trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Records the outcome of the guarded call.
    ///
    /// Only upstream failures count against the circuit; caller errors are
    /// treated like an unrecorded permit.
    pub fn record<T>(mut self, result: &Result<T, FxError>) {
        match result {
            Ok(_) => {
                self.settled = true;
                self.breaker.on_success(self.generation, self.trial);
            }
            Err(err) if err.is_upstream_failure() => {
                self.settled = true;
                self.breaker.on_failure(self.generation, self.trial);
            }
            Err(_) => {}
        }
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}
