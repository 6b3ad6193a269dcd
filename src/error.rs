//! Failures reported by an orchestration engine.
//!
//! The execution helpers in [`crate::run`] never construct these themselves:
//! whatever the engine (or a unit's own code) returns is handed to the caller
//! unchanged.

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An engine failure, passed through verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The engine refused to schedule or start the unit of work.
    #[error("failed to dispatch `{unit}`: {message}")]
    Dispatch {
        /// Type name of the unit that could not be dispatched.
        unit: String,
        /// Engine-provided reason.
        message: String,
    },

    /// The unit ran and returned a failure.
    #[error("{message}")]
    Application {
        /// Failure message produced by the unit.
        message: String,
        /// When set, the engine must not retry the unit.
        non_retryable: bool,
    },

    /// No implementation is registered for the requested unit type.
    #[error("no implementation registered for `{0}`")]
    NotRegistered(String),

    /// The execution context was cancelled.
    #[error("execution cancelled")]
    Cancelled,

    /// The execution context's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An engine-enforced timeout expired.
    #[error("`{0}` timed out")]
    TimedOut(String),

    /// A value could not be converted to or from a payload.
    #[error("payload conversion failed: {0}")]
    Payload(String),
}

impl Error {
    /// Creates a retryable application failure.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            non_retryable: false,
        }
    }

    /// Creates an application failure the engine must not retry.
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            non_retryable: true,
        }
    }

    /// Creates a dispatch failure for `unit`.
    pub fn dispatch(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Returns true if this failure came from context cancellation or deadline expiry.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns true if an engine may run the unit again after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Application { non_retryable, .. } => !non_retryable,
            Self::TimedOut(_) => true,
            _ => false,
        }
    }
}
