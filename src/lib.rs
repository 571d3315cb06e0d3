//! rotogram - Deterministic content rotation publisher
//!
//! Publishes items from an educational content catalog to an external
//! broadcast channel on a fixed daily quota, rotating deterministically
//! through category families so every item is published exactly once per
//! epoch.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`catalog`] - Content catalog loading and indexing
//! - [`scheduler`] - Rotation planning, dispatch and triggering
//! - [`channel`] - Broadcast channel abstraction and HTTP backend
//! - [`format`] - Item-to-post formatting
//! - [`storage`] - Schedule state persistence and the audit log
//!
//! # Example
//!
//! ```no_run
//! use rotogram::catalog::JsonCatalog;
//! use rotogram::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!     let catalog = JsonCatalog::from_file(&config.storage.catalog_path)?;
//!     println!("{} items loaded", catalog.len());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod channel;
pub mod config;
pub mod error;
pub mod format;
pub mod scheduler;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{CatalogIndex, ContentCatalog, ContentItem, JsonCatalog};
    pub use crate::channel::{BroadcastChannel, ChannelError, SendReceipt};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::format::{FormattedPost, Formatter, PlainFormatter};
    pub use crate::scheduler::{
        CategoryFamilies, DispatcherConfig, PublishDispatcher, ScheduleState, TriggerScheduler,
    };
    pub use crate::storage::{AuditLog, StateStore};
}

// Direct re-exports for convenience
pub use scheduler::{PublishDispatcher, ScheduleState};
