//! Persistence for the rotation core
//!
//! Two file-backed documents: the schedule state (a single JSON object,
//! full overwrite on save) and the audit log (a JSON array, append-only
//! with bounded retention). Both tolerate absent or corrupt files by
//! starting from a clean slate rather than failing startup.

pub mod audit;
pub mod state_store;

pub use audit::{AuditEntry, AuditLog, PostStatus, SubAttempt};
pub use state_store::StateStore;
