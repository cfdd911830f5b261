//! Error types for the navigation engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! A vetoed operation is NOT an error: interceptors rejecting an operation is
//! a defined no-op outcome, reported through `ExecutionOutcome::Vetoed` in the
//! engine crate rather than through this enum.

use thiserror::Error;

/// Result type alias for navigation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the navigation engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Same-container re-entry into `execute()` while an execution is in flight.
    ///
    /// This is a programmer error: an interceptor or subscriber synchronously
    /// re-entered the same container's execute path. The backstack is left
    /// unchanged by the rejected call.
    #[error("reentrant execution on container '{container}'")]
    ReentrantExecution {
        /// Key of the container whose guard was already held
        container: String,
    },

    /// A navigation contract was violated at operation construction.
    ///
    /// Completing a result-bearing key without a payload, or completing a
    /// plain key with one, are the canonical cases.
    #[error("contract violation: {reason}")]
    ContractViolation {
        /// Description of the violated contract
        reason: String,
    },

    /// Two simultaneous observers were registered for one correlation id.
    ///
    /// At most one observer may be active per correlation id at a time.
    #[error("duplicate result observer for correlation {correlation}")]
    DuplicateObserver {
        /// Display form of the contested correlation id
        correlation: String,
    },

    /// A delivered payload's runtime type does not match the observer's
    /// expected type. Never silently coerced.
    #[error("result type mismatch: expected {expected}, got {actual}")]
    ResultTypeMismatch {
        /// Type name the observer registered for
        expected: String,
        /// Type name of the payload actually delivered
        actual: String,
    },

    /// A persistent metadata value has no registered codec.
    ///
    /// Raised under `CodecPolicy::Enforce`; downgraded to a `tracing` warning
    /// under `CodecPolicy::Warn`.
    #[error("no codec registered for metadata key '{key}' (type {type_name})")]
    MissingCodec {
        /// Name of the metadata key holding the unencodable value
        key: String,
        /// Type name of the unencodable value
        type_name: String,
    },

    /// Invalid operation or state
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Description of what was invalid
        reason: String,
    },

    /// Serialization/deserialization error at the persistence boundary
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Convenience constructor for contract violations
    pub fn contract_violation(reason: impl Into<String>) -> Self {
        Error::ContractViolation {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for invalid operations
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
