//! Unified error handling for the rotogram crate
//!
//! This module provides a unified error type that consolidates the
//! domain-specific errors into a single `Error` enum, while keeping the
//! detailed variants available at module boundaries.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rotogram::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::channel::ChannelError;
pub use crate::scheduler::error::SchedulerError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Channel and network errors (HTTP, timeout, rejection)
    Channel,
    /// Scheduler and rotation errors
    Scheduler,
    /// Storage and I/O errors
    Storage,
    /// Parsing and serialization errors
    Parsing,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

/// Unified error type for the rotogram crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scheduler and rotation errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Broadcast channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

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

impl Error {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Channel(_) => true,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Scheduler(SchedulerError::Channel { .. }) | Self::Channel(_) => {
                ErrorCategory::Channel
            }
            Self::Scheduler(SchedulerError::Storage { .. }) => ErrorCategory::Storage,
            Self::Scheduler(SchedulerError::TriggerConfig { .. }) => ErrorCategory::Config,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

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
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err = Error::Scheduler(SchedulerError::CatalogExhausted);
        assert_eq!(err.category(), ErrorCategory::Scheduler);

        let err = Error::Channel(ChannelError::Rejected("bad request".to_string()));
        assert_eq!(err.category(), ErrorCategory::Channel);
    }

    #[test]
    fn test_is_recoverable() {
        let err = Error::Channel(ChannelError::Other("connection reset".to_string()));
        assert!(err.is_recoverable());

        let err = Error::config("missing token");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_scheduler_channel_error_is_channel_category() {
        let channel_err = ChannelError::Other("timeout".to_string());
        let err = Error::Scheduler(SchedulerError::from(channel_err));
        assert_eq!(err.category(), ErrorCategory::Channel);
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("Invalid window spec");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: Error = anyhow::anyhow!("context lost").into();
        assert_eq!(err.category(), ErrorCategory::Other);
    }
}
