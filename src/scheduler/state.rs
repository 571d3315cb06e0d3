//! Persistent rotation state
//!
//! A single mutable document owned by the dispatcher process. It records
//! where each rotation stands (the technical sliding window, the
//! humanitarian round-robin, per-category item cursors), the global set of
//! everything ever published, and the progress through today's quota.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Category families driving the two rotation rules
///
/// Humanitarian categories rotate strictly round-robin, one per day.
/// Technical categories move through a sliding window of three active
/// categories; each stays active for three consecutive days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFamilies {
    /// Ordered humanitarian category ids (size H)
    pub humanitarian: Vec<String>,

    /// Ordered technical category ids (size T, the rotation period)
    pub technical: Vec<String>,
}

impl CategoryFamilies {
    /// Create a new family set
    pub fn new(humanitarian: Vec<String>, technical: Vec<String>) -> Self {
        Self {
            humanitarian,
            technical,
        }
    }

    /// Full period of the technical rotation (T days)
    pub fn period(&self) -> usize {
        self.technical.len()
    }
}

/// The persisted schedule document
///
/// Every field carries a serde default so legacy or partially populated
/// documents still load field-by-field instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleState {
    /// Position of the technical sliding window, in [0, T)
    pub cycle_day: usize,

    /// Next humanitarian category to use, in [0, H)
    pub humanitarian_index: usize,

    /// Next candidate position within each category's item list
    pub category_cursor: HashMap<String, usize>,

    /// Item ids ever successfully published; emptied on epoch rollover
    pub posted: HashSet<String>,

    /// Successful or skipped publishes so far today
    pub posts_today_count: u32,

    /// Which of today's quota slots the next single publish consumes
    pub daily_post_index: u32,

    /// Calendar date of the last publish activity
    pub last_post_date: Option<NaiveDate>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            cycle_day: 0,
            humanitarian_index: 0,
            category_cursor: HashMap::new(),
            posted: HashSet::new(),
            posts_today_count: 0,
            daily_post_index: 0,
            last_post_date: None,
        }
    }
}

impl ScheduleState {
    /// Cursor for a category (0 if never advanced)
    pub fn cursor(&self, category: &str) -> usize {
        self.category_cursor.get(category).copied().unwrap_or(0)
    }

    /// Reset daily counters when the recorded date is not `today`
    ///
    /// Returns true if a day boundary was crossed. Must run before any
    /// planning on a given day.
    pub fn roll_day_boundary(&mut self, today: NaiveDate) -> bool {
        if self.last_post_date == Some(today) {
            return false;
        }

        self.posts_today_count = 0;
        self.daily_post_index = 0;
        self.last_post_date = Some(today);
        true
    }

    /// Empty the posted set once the whole catalog has been published
    ///
    /// Returns true if a rollover happened. Callers run this before each
    /// planning pass.
    pub fn rollover_if_exhausted(&mut self, catalog_total: usize) -> bool {
        if catalog_total == 0 || self.posted.len() < catalog_total {
            return false;
        }

        tracing::info!(
            posted = self.posted.len(),
            catalog_total,
            "Catalog fully published, starting new epoch"
        );
        self.posted.clear();
        true
    }

    /// Adopt the day-level rotation indices from a planner-proposed state
    ///
    /// Copies only `cycle_day` and `humanitarian_index`; category cursors,
    /// `posted` and the daily counters are committed per publish by the
    /// dispatcher.
    pub fn adopt_rotation(&mut self, proposed: &ScheduleState) {
        self.cycle_day = proposed.cycle_day;
        self.humanitarian_index = proposed.humanitarian_index;
    }

    /// Record a successful publish of an item and advance its category cursor
    pub fn commit_publish(&mut self, item_id: &str, category: &str, cursor_position: usize) {
        self.posted.insert(item_id.to_string());
        self.category_cursor
            .insert(category.to_string(), cursor_position + 1);
    }

    /// Record a successful publish of an item
    pub fn mark_posted(&mut self, item_id: &str) {
        self.posted.insert(item_id.to_string());
    }
}
