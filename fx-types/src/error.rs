//! Error types for the conversion service.

use std::time::Duration;

/// Failures produced by the conversion core.
///
/// Each variant is classified by [`is_transient`](Self::is_transient) (should
/// the retry loop try again) and [`is_upstream_failure`](Self::is_upstream_failure)
/// (does it count against the circuit breaker).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FxError {
    /// Malformed or missing caller input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Valid input that policy refuses to serve.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Network failure, timeout, throttling or upstream 5xx.
    #[error("Upstream unavailable: {0}")]
    Transient(String),

    /// The upstream answered but the body could not be interpreted.
    #[error("Malformed upstream response: {0}")]
    Parse(String),

    /// The upstream refused the request (4xx), e.g. an unknown currency.
    #[error("Upstream rejected request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    /// The circuit breaker is open; no request was sent.
    #[error("Circuit open: upstream calls suspended for {}s", retry_after.as_secs())]
    CircuitOpen { retry_after: Duration },

    /// Every attempt failed transiently.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl FxError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FxError::Transient(_))
    }

    /// Whether this outcome indicates an unhealthy upstream.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            FxError::Transient(_) | FxError::RetriesExhausted { .. } | FxError::Parse(_)
        )
    }

    /// Whether the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FxError::Validation(_) | FxError::Unsupported(_) | FxError::UpstreamRejected { .. }
        )
    }
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        retry_after_seconds: u64,
    },

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FxError> for AppError {
    fn from(err: FxError) -> Self {
        match err {
            FxError::Validation(msg) | FxError::Unsupported(msg) => AppError::BadRequest(msg),
            FxError::UpstreamRejected { status: 404, message } => AppError::NotFound(message),
            e @ FxError::UpstreamRejected { .. } => AppError::BadRequest(e.to_string()),
            e @ FxError::CircuitOpen { retry_after } => AppError::ServiceUnavailable {
                message: e.to_string(),
                // Whole seconds, rounded up.
                retry_after_seconds: retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0),
            },
            e @ (FxError::Transient(_) | FxError::Parse(_) | FxError::RetriesExhausted { .. }) => {
                AppError::BadGateway(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let transient = FxError::Transient("connection reset".into());
        assert!(transient.is_transient());
        assert!(transient.is_upstream_failure());

        let parse = FxError::Parse("expected value".into());
        assert!(!parse.is_transient());
        assert!(parse.is_upstream_failure());

        let exhausted = FxError::RetriesExhausted {
            attempts: 3,
            last_error: "timeout".into(),
        };
        assert!(!exhausted.is_transient());
        assert!(exhausted.is_upstream_failure());

        for err in [
            FxError::Validation("x".into()),
            FxError::Unsupported("x".into()),
            FxError::UpstreamRejected {
                status: 422,
                message: "x".into(),
            },
        ] {
            assert!(!err.is_transient());
            assert!(!err.is_upstream_failure());
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_app_error_mapping() {
        assert!(matches!(
            AppError::from(FxError::Validation("bad".into())),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(FxError::Unsupported("no".into())),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(FxError::UpstreamRejected {
                status: 404,
                message: "not found".into()
            }),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(FxError::Parse("eof".into())),
            AppError::BadGateway(_)
        ));
        assert!(matches!(
            AppError::from(FxError::RetriesExhausted {
                attempts: 3,
                last_error: "eof".into()
            }),
            AppError::BadGateway(_)
        ));
    }

    #[test]
    fn test_circuit_open_rounds_retry_after_up() {
        let err = AppError::from(FxError::CircuitOpen {
            retry_after: Duration::from_millis(1500),
        });
        match err {
            AppError::ServiceUnavailable {
                retry_after_seconds,
                ..
            } => assert_eq!(retry_after_seconds, 2),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
