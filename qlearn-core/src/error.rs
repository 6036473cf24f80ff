//! Errors in the library.
use thiserror::Error;

/// Errors raised by the components of this crate.
#[derive(Debug, Error)]
pub enum QlError {
    /// The requested key does not exist in a [`Record`](crate::record::Record).
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// The value in a [`Record`](crate::record::Record) is not of the requested type.
    #[error("Record value type error: expected {0}")]
    RecordValueTypeError(String),

    /// A batch was requested from a buffer holding too few transitions.
    #[error("Insufficient transitions: required {required}, available {available}")]
    InsufficientTransitions {
        /// Number of transitions requested.
        required: usize,

        /// Number of transitions stored in the buffer.
        available: usize,
    },

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Priorities were updated without sample indices or TD errors.
    #[error("Sample indices and TD errors are required to update priorities")]
    MissingPriorityInfo,
}
