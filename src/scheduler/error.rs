//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Time-of-day label is not `HH:MM`
    InvalidTime {
        value: String,
    },

    /// Calendar date is not `YYYY-MM-DD`
    InvalidDate {
        value: String,
    },

    /// End date before start date
    InvalidDateRange {
        start: String,
        end: String,
    },

    /// Request failed validation before allocation
    Validation {
        field: String,
        reason: String,
    },

    /// Content selection could not be resolved
    SelectionUnavailable {
        reason: String,
    },

    /// Collaborator (catalog, store, queue) failed
    Collaborator {
        operation: String,
        reason: String,
    },

    /// Serialization/deserialization error
    SerializationError {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTime { value } => {
                write!(f, "Invalid time '{}'. Expected HH:MM", value)
            }
            Self::InvalidDate { value } => {
                write!(f, "Invalid date '{}'. Expected YYYY-MM-DD", value)
            }
            Self::InvalidDateRange { start, end } => {
                write!(f, "Invalid date range: end {} is before start {}", end, start)
            }
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for '{}': {}", field, reason)
            }
            Self::SelectionUnavailable { reason } => {
                write!(f, "Content selection unavailable: {}", reason)
            }
            Self::Collaborator { operation, reason } => {
                write!(f, "Collaborator error during '{}': {}", operation, reason)
            }
            Self::SerializationError { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create an invalid time error
    pub fn invalid_time(value: impl Into<String>) -> Self {
        Self::InvalidTime {
            value: value.into(),
        }
    }

    /// Create an invalid date error
    pub fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
        }
    }

    /// Create an inverted date range error
    pub fn invalid_date_range(start: impl ToString, end: impl ToString) -> Self {
        Self::InvalidDateRange {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a selection error
    pub fn selection_unavailable(reason: impl Into<String>) -> Self {
        Self::SelectionUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a collaborator error with context
    pub fn collaborator(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller supplied bad input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTime { .. }
                | Self::InvalidDate { .. }
                | Self::InvalidDateRange { .. }
                | Self::Validation { .. }
        )
    }

    /// Check if the error is recoverable
    ///
    /// Only collaborator failures are worth retrying; the engine itself never retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }
}
