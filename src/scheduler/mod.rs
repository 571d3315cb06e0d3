//! Content rotation scheduling system
//!
//! This module is the heart of the crate: a deterministic daily rotation
//! over a content catalog, split into a pure planning layer and an
//! effectful dispatch layer.
//!
//! # Overview
//!
//! Each day gets a plan of four posts: one from the humanitarian family
//! (round-robin over its categories) and three from the technical family
//! (a sliding window over its categories). The planner is a pure function
//! of the persisted schedule state and the catalog; the dispatcher owns
//! every side effect and decides when the planner's proposed cursors are
//! committed.
//!
//! # Features
//!
//! - **Deterministic Planning**: The same state and catalog always produce
//!   the same daily plan
//! - **Single Daily Commit**: The day-level rotation indices advance once
//!   per day, when the last quota slot completes; category cursors commit
//!   per successful publish
//! - **At-Least-Once Delivery**: Failed sends leave the state untouched
//!   and the slot is retried at the next trigger
//! - **Epoch Rollover**: When every item has been published, the posted
//!   set is cleared and the rotation starts a new epoch
//! - **Randomized Fire Times**: One publish per configured window per day,
//!   at a time drawn at startup and fixed for the process lifetime
//!
//! # Modules
//!
//! - [`planner`] - Pure daily planning and multi-day preview
//! - [`state`] - Persisted schedule state and category families
//! - [`dispatcher`] - Effectful publishing against a broadcast channel
//! - [`trigger`] - Window-based daily trigger loop
//! - [`clock`] - Injectable time source
//! - [`error`] - Scheduler error types
//!
//! # Quick Start
//!
//! ```ignore
//! use rotogram::scheduler::{plan_daily_posts, CategoryFamilies, ScheduleState};
//! use rotogram::catalog::{CatalogIndex, JsonCatalog};
//! use std::path::Path;
//!
//! let catalog = JsonCatalog::from_file(Path::new("catalog.json"))?;
//! let index = CatalogIndex::from_catalog(&catalog);
//! let families = CategoryFamilies::new(humanitarian, technical);
//!
//! let state = ScheduleState::default();
//! let (plan, proposed) = plan_daily_posts(&state, &index, &families, true);
//! for assignment in plan.iter() {
//!     println!("{} ({:?})", assignment.item_id, assignment.kind);
//! }
//! ```

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod planner;
pub mod state;
pub mod trigger;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{BatchOutcome, DispatcherConfig, PublishDispatcher, PublishOutcome};
pub use error::{SchedulerError, SchedulerResult};
pub use planner::{
    plan_daily_posts, preview_next_posts, DailyPlan, PostAssignment, PostKind, TECH_WINDOW,
};
pub use state::{CategoryFamilies, ScheduleState};
pub use trigger::{PublishWindow, TriggerConfig, TriggerScheduler};
