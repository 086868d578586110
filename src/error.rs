//! Error taxonomy shared by every algorithm in the crate.

/// Boxed error produced by caller-supplied code (objective, penalty,
/// constraint and logger callbacks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, OptimizationError>;

/// Errors raised while building or running an optimization.
///
/// - [`InvalidConfiguration`](Self::InvalidConfiguration) is only raised by
///   constructors and `validate()` methods, never mid-run.
/// - [`InvalidState`](Self::InvalidState) signals an internal invariant
///   violation (e.g. an operator invoked on an empty generation). It is
///   fatal and never retried.
/// - [`Evaluation`](Self::Evaluation) wraps a failure of caller-supplied
///   objective or penalty code. The original error stays reachable through
///   [`std::error::Error::source`].
#[derive(Debug, thiserror::Error)]
pub enum OptimizationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{0}")]
    Evaluation(#[source] BoxError),
}

impl OptimizationError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Whether this is an [`InvalidConfiguration`](Self::InvalidConfiguration) error.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }

    /// Whether this is an [`InvalidState`](Self::InvalidState) error.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}
