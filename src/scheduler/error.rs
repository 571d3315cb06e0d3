//! Error types for the scheduler module

use crate::channel::ChannelError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Unknown content item requested
    #[error("Unknown content item '{id}'")]
    UnknownItem { id: String },

    /// Every catalog item has already been published
    #[error("No unposted items available in the catalog")]
    CatalogExhausted,

    /// The broadcast channel rejected or failed the primary send
    #[error("Broadcast send failed: {source}")]
    Channel {
        #[from]
        source: ChannelError,
    },

    /// The state store could not persist the schedule document
    #[error("State store failure: {message}")]
    Storage { message: String },

    /// Trigger configuration error
    #[error("Trigger config error in '{field}': {reason}")]
    TriggerConfig { field: String, reason: String },
}

impl SchedulerError {
    /// Create an unknown-item error
    pub fn unknown_item(id: impl Into<String>) -> Self {
        Self::UnknownItem { id: id.into() }
    }

    /// Create a storage error from an anyhow chain
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage {
            message: format!("{err:#}"),
        }
    }

    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable (a later retry may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Channel { .. } | Self::Storage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_item_error() {
        let err = SchedulerError::unknown_item("t-404");
        assert!(err.to_string().contains("t-404"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_trigger_config_error() {
        let err = SchedulerError::trigger_config("windows", "must not overlap");
        assert!(err.to_string().contains("windows"));
        assert!(err.to_string().contains("must not overlap"));
    }

    #[test]
    fn test_channel_error_is_recoverable() {
        let err: SchedulerError = ChannelError::Other("connection reset".to_string()).into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_storage_error_from_anyhow() {
        let err = SchedulerError::storage(anyhow::anyhow!("disk full"));
        assert!(err.to_string().contains("disk full"));
        assert!(err.is_recoverable());
    }
}
