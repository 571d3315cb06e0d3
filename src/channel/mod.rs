//! Broadcast channel boundary
//!
//! The external channel is a collaborator the dispatcher sends finished
//! payloads to. Implementations deliver a primary message, optionally
//! thread follow-up messages underneath it, and expose a thread-id lookup
//! the dispatcher polls with a bounded timeout.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur while talking to the broadcast channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid channel configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The channel accepted the request but rejected the payload
    #[error("Broadcast rejected: {0}")]
    Rejected(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("Channel error: {0}")]
    Other(String),
}

/// Acknowledgment returned for a successful primary send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Channel-assigned message identifier
    pub message_id: String,

    /// Time the channel accepted the message
    pub timestamp: DateTime<Utc>,
}

impl SendReceipt {
    /// Create a receipt stamped with the current time
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Trait for broadcast channels
///
/// Implement this trait to deliver posts to a concrete target.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Send the primary payload; returns the channel's receipt
    async fn send(&self, payload: &str) -> ChannelResult<SendReceipt>;

    /// Send a follow-up payload threaded under a previously sent message
    async fn send_follow_up(&self, payload: &str, parent_id: &str) -> ChannelResult<()>;

    /// Look up the discussion-thread id of a sent message
    ///
    /// A single lookup; `None` means the thread is not available yet. The
    /// dispatcher owns the polling loop and its timeout.
    async fn resolve_thread_id(&self, message_id: &str) -> ChannelResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_receipt_new() {
        let receipt = SendReceipt::new("msg-42");
        assert_eq!(receipt.message_id, "msg-42");
    }

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::Rejected("payload too long".to_string());
        assert!(err.to_string().contains("payload too long"));

        let err = ChannelError::InvalidConfig("empty endpoint".to_string());
        assert!(err.to_string().contains("empty endpoint"));
    }
}
