//! Unified error handling for the showrunner crate
//!
//! Domain code returns [`SchedulerError`]; storage adapters and the CLI work with
//! `anyhow`. This module folds both into one [`Error`] so callers can decide how to
//! react by [`ErrorCategory`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use showrunner::error::{Error, ShowrunnerErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retry later: {}", err.user_message());
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::scheduler::error::SchedulerError;

/// Common trait for showrunner error types
pub trait ShowrunnerErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Short message suitable for end users
    fn user_message(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller supplied malformed input
    Validation,
    /// Scheduling failed for a non-input reason
    Scheduler,
    /// Storage and I/O errors
    Storage,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Scheduler => "scheduler",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation => 2,
            Self::Config => 3,
            Self::Storage => 4,
            Self::Scheduler | Self::Other => 1,
        }
    }
}

/// Unified error type for the showrunner crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scheduling and validation errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ShowrunnerErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Database(_) => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Scheduler(e) if e.is_validation() => format!("Invalid request: {e}"),
            Self::Scheduler(e) => e.to_string(),
            Self::Database(_) | Self::Io(_) => String::from("Schedule storage is unavailable"),
            Self::Json(e) => format!("Malformed data: {e}"),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            Self::Other { context, .. } => context.clone(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Scheduler(e) if e.is_validation() => ErrorCategory::Validation,
            Self::Scheduler(SchedulerError::Collaborator { .. }) => ErrorCategory::Storage,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Database(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Validation,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

impl From<anyhow::Error> for Error {
    /// Recovers the typed error when one is wrapped, otherwise keeps the message chain
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<Error>() {
            Ok(e) => return e,
            Err(err) => err,
        };
        let err = match err.downcast::<SchedulerError>() {
            Ok(e) => return Self::Scheduler(e),
            Err(err) => err,
        };
        let err = match err.downcast::<rusqlite::Error>() {
            Ok(e) => return Self::Database(e),
            Err(err) => err,
        };
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
