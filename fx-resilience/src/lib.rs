//! Resilience primitives for calling a flaky upstream.
//!
//! Three independent building blocks, composed by the application service:
//!
//! - [`RateCache`] - key/value store with per-entry TTL and single-flight misses
//! - [`RetryPolicy`] - retries transient failures with exponential backoff
//! - [`CircuitBreaker`] - fails fast while the upstream is deemed unhealthy
//!
//! None of them knows about HTTP. Failures are classified through
//! [`FxError::is_transient`](fx_types::FxError::is_transient) and
//! [`FxError::is_upstream_failure`](fx_types::FxError::is_upstream_failure).
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use fx_resilience::{CircuitBreaker, CircuitBreakerConfig, RateCache, RetryPolicy};
//! use fx_types::FxError;
//!
//! # async fn demo() -> Result<(), FxError> {
//! let cache = RateCache::<String>::new();
//! let breaker = CircuitBreaker::new("frankfurter", CircuitBreakerConfig::default());
//! let retry = RetryPolicy::new(3, Duration::from_secs(2));
//!
//! let permit = breaker.try_acquire()?;
//! let value = cache
//!     .get_or_try_fetch("latest:", Duration::from_secs(3600), || async move {
//!         let result = retry.execute(|| async { Ok("rates".to_string()) }).await;
//!         permit.record(&result);
//!         result
//!     })
//!     .await?;
//! assert_eq!(value.as_str(), "rates");
//! # Ok(())
//! # }
//! ```

mod breaker;
mod cache;
mod retry;

pub use breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStatus,
    TransitionListener,
};
pub use cache::RateCache;
pub use retry::RetryPolicy;
