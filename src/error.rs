use std::fmt;

/// Errors raised by the feature engine and the binder
#[derive(Debug, Clone, PartialEq)]
pub enum MviError {
    /// A named connection or standalone middleware was rebound with a different identity
    Configuration { reason: String },
    /// State was mutated from a thread other than the one the thread strategy mandates
    ConcurrencyViolation { expected: String, actual: String },
    /// Actor, reducer, post-processor or news publisher failed
    PipelineFault { reason: String },
    /// No tokio runtime was available to drive the feature
    NoRuntime,
}

impl MviError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        MviError::Configuration {
            reason: reason.into(),
        }
    }

    /// True for errors that end the owning feature
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MviError::ConcurrencyViolation { .. } | MviError::PipelineFault { .. }
        )
    }
}

impl fmt::Display for MviError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MviError::Configuration { reason } => {
                write!(f, "Configuration error: {}", reason)
            }
            MviError::ConcurrencyViolation { expected, actual } => {
                write!(
                    f,
                    "Concurrency violation: expected thread {}, but was {}",
                    expected, actual
                )
            }
            MviError::PipelineFault { reason } => {
                write!(f, "Pipeline fault: {}", reason)
            }
            MviError::NoRuntime => {
                write!(f, "No tokio runtime available to run the feature")
            }
        }
    }
}

impl std::error::Error for MviError {}

/// Result type for engine and binder operations
pub type MviResult<T> = Result<T, MviError>;
