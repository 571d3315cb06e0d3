//! Publish dispatcher
//!
//! Owns every side effect of the rotation: channel sends, schedule-state
//! persistence and audit-log appends. The planner proposes, the dispatcher
//! commits.
//!
//! Three publishing contracts:
//!
//! - `publish_next` is the trigger-driven entry point. It consumes one
//!   quota slot of the day's plan, which is computed at the first rotation
//!   publish of the day and reused for the remaining slots. An item
//!   published out of band after planning consumes its slot as `skipped`
//!   instead of being sent twice. A successful publish commits that item's
//!   category cursor; the day-level rotation indices (`cycle_day` and
//!   `humanitarian_index`) are committed only when the last slot of the
//!   day completes, so repeated calls within a day never advance the
//!   window more than once.
//! - `publish_batch` publishes the remaining slots of the day's plan in
//!   one call, continuing past individual failures, and consumes the
//!   day's quota at the end.
//! - `publish_random` / `publish_item` bypass the rotation entirely and
//!   only grow the posted set.
//!
//! Delivery is at-least-once: a crash between the channel send and the
//! state save leaves the item unposted in the document, and the next
//! trigger retries the slot.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::clock::Clock;
use super::error::{SchedulerError, SchedulerResult};
use super::planner::{
    plan_daily_posts, preview_next_posts, DailyPlan, PostAssignment, PostKind, TECH_WINDOW,
};
use super::state::{CategoryFamilies, ScheduleState};
use crate::catalog::{CatalogIndex, ContentCatalog, ContentItem};
use crate::channel::{BroadcastChannel, SendReceipt};
use crate::format::Formatter;
use crate::storage::{AuditEntry, AuditLog, PostStatus, StateStore, SubAttempt};

/// Dispatcher settings, fixed at startup
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Category families driving the rotation
    pub families: CategoryFamilies,

    /// Daily quota of publishes
    pub posts_per_day: u32,

    /// Wrap category scans past the end of the item list
    pub reset_on_end: bool,

    /// Fixed delay between sequential sends
    pub inter_post_delay: Duration,

    /// Total budget for resolving a message's discussion thread
    pub thread_resolve_timeout: Duration,

    /// Pause between thread-resolution polls
    pub thread_resolve_interval: Duration,
}

impl DispatcherConfig {
    /// Create a config with the standard quota and delays
    pub fn new(families: CategoryFamilies) -> Self {
        Self {
            families,
            posts_per_day: 4,
            reset_on_end: true,
            inter_post_delay: Duration::from_secs(3),
            thread_resolve_timeout: Duration::from_secs(10),
            thread_resolve_interval: Duration::from_secs(1),
        }
    }

    /// Set the daily quota
    pub fn with_posts_per_day(mut self, quota: u32) -> Self {
        self.posts_per_day = quota;
        self
    }

    /// Set the wrap-around behavior
    pub fn with_reset_on_end(mut self, reset_on_end: bool) -> Self {
        self.reset_on_end = reset_on_end;
        self
    }

    /// Set the inter-send delay
    pub fn with_inter_post_delay(mut self, delay: Duration) -> Self {
        self.inter_post_delay = delay;
        self
    }

    /// Set the thread-resolution timeout and poll interval
    pub fn with_thread_resolution(mut self, timeout: Duration, interval: Duration) -> Self {
        self.thread_resolve_timeout = timeout;
        self.thread_resolve_interval = interval;
        self
    }
}

/// Result of a single publish call
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    /// What happened to the attempt
    pub status: PostStatus,

    /// Item involved, if any
    pub item_id: Option<String>,

    /// Rotation rule or manual path behind the attempt
    pub kind: Option<PostKind>,

    /// Channel message id for successful sends
    pub external_message_id: Option<String>,

    /// Quota slot consumed, for rotation-driven publishes
    pub slot: Option<u32>,
}

impl PublishOutcome {
    fn skipped(item_id: Option<String>, kind: Option<PostKind>, slot: u32) -> Self {
        Self {
            status: PostStatus::Skipped,
            item_id,
            kind,
            external_message_id: None,
            slot: Some(slot),
        }
    }
}

/// Result of a whole-day batch publish
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Assignments in the day's plan
    pub planned: usize,

    /// Primary sends accepted by the channel
    pub succeeded: usize,

    /// Primary sends that failed
    pub failed: usize,

    /// Per-assignment outcomes, in plan order
    pub outcomes: Vec<PublishOutcome>,
}

/// The day's plan, computed once and reused for every slot of that day
struct CachedPlan {
    date: NaiveDate,
    plan: DailyPlan,
    proposed: ScheduleState,
}

/// Mutable dispatcher state: the schedule document plus the day's plan
struct DispatchState {
    schedule: ScheduleState,
    day_plan: Option<CachedPlan>,
}

/// Orchestrates publishes and owns the schedule state
///
/// All entry points serialize behind one mutex, so a manual CLI trigger
/// cannot interleave with a scheduled trigger's read-modify-write cycle.
pub struct PublishDispatcher {
    catalog: Arc<dyn ContentCatalog>,
    channel: Arc<dyn BroadcastChannel>,
    formatter: Arc<dyn Formatter>,
    clock: Arc<dyn Clock>,
    store: StateStore,
    audit: AuditLog,
    config: DispatcherConfig,
    state: Mutex<DispatchState>,
}

impl PublishDispatcher {
    /// Create a dispatcher, loading state from the store
    pub fn new(
        catalog: Arc<dyn ContentCatalog>,
        channel: Arc<dyn BroadcastChannel>,
        formatter: Arc<dyn Formatter>,
        clock: Arc<dyn Clock>,
        store: StateStore,
        audit: AuditLog,
        config: DispatcherConfig,
    ) -> Self {
        let schedule = store.load();
        Self {
            catalog,
            channel,
            formatter,
            clock,
            store,
            audit,
            config,
            state: Mutex::new(DispatchState {
                schedule,
                day_plan: None,
            }),
        }
    }

    /// Snapshot of the current in-memory schedule state
    pub async fn state_snapshot(&self) -> ScheduleState {
        self.state.lock().await.schedule.clone()
    }

    /// Last `n` audit entries, oldest first
    pub fn recent_attempts(&self, n: usize) -> Vec<AuditEntry> {
        self.audit.tail(n)
    }

    /// Forecast the next `days` plans without side effects
    pub async fn preview(&self, days: usize) -> Vec<DailyPlan> {
        let state = self.state.lock().await.schedule.clone();
        let index = CatalogIndex::from_catalog(self.catalog.as_ref());
        preview_next_posts(
            &state,
            &index,
            &self.config.families,
            days,
            self.config.reset_on_end,
        )
    }

    /// Today's plan and its proposed state, computed once per day
    ///
    /// Later calls the same day reuse the cached plan, so every quota slot
    /// maps to the item chosen at the day's first rotation publish even
    /// when manual publishes land in between.
    fn plan_for_today(
        &self,
        state: &mut ScheduleState,
        day_plan: &mut Option<CachedPlan>,
        today: NaiveDate,
    ) -> (DailyPlan, ScheduleState) {
        if let Some(cached) = day_plan.as_ref() {
            if cached.date == today {
                return (cached.plan.clone(), cached.proposed.clone());
            }
        }

        let index = CatalogIndex::from_catalog(self.catalog.as_ref());
        state.rollover_if_exhausted(index.total);
        let (plan, proposed) = plan_daily_posts(
            state,
            &index,
            &self.config.families,
            self.config.reset_on_end,
        );
        *day_plan = Some(CachedPlan {
            date: today,
            plan: plan.clone(),
            proposed: proposed.clone(),
        });
        (plan, proposed)
    }

    /// Publish the next slot of the day's plan (trigger entry point)
    ///
    /// The plan is computed at the day's first call and reused, so a slot
    /// whose item was published out of band in the meantime is consumed as
    /// `skipped` rather than double-sent. On a primary-send failure
    /// nothing is committed and the error is re-raised, so the next
    /// trigger retries the same slot.
    pub async fn publish_next(&self) -> SchedulerResult<PublishOutcome> {
        let mut guard = self.state.lock().await;
        let DispatchState { schedule: state, day_plan } = &mut *guard;

        let today = self.clock.today();
        if state.roll_day_boundary(today) {
            tracing::info!(%today, "Day boundary crossed, daily counters reset");
        }

        if state.daily_post_index >= self.config.posts_per_day {
            tracing::debug!(
                quota = self.config.posts_per_day,
                "Daily quota already consumed"
            );
            return Ok(PublishOutcome::skipped(None, None, state.daily_post_index));
        }

        let (plan, proposed) = self.plan_for_today(state, day_plan, today);
        let slot = state.daily_post_index;
        let (cycle_day, humanitarian_index) = (state.cycle_day, state.humanitarian_index);

        let Some(assignment) = self.assignment_for_slot(&plan, slot, cycle_day) else {
            // Exhaustion produced a short plan: the slot is consumed anyway
            // so the day still completes and the window still advances.
            self.advance_slot(state, &proposed);
            self.store.save(state).map_err(SchedulerError::storage)?;
            self.append_audit(AuditEntry::new(
                PostStatus::Skipped,
                cycle_day,
                humanitarian_index,
            ));
            tracing::info!(slot, "No assignment for slot, plan exhausted");
            return Ok(PublishOutcome::skipped(None, None, slot));
        };

        if state.posted.contains(&assignment.item_id) {
            // Published out of band after the plan was drawn: the slot is
            // consumed without a second send.
            self.advance_slot(state, &proposed);
            self.store.save(state).map_err(SchedulerError::storage)?;
            self.append_audit(
                AuditEntry::new(PostStatus::Skipped, cycle_day, humanitarian_index)
                    .with_item(&assignment.item_id)
                    .with_kind(assignment.kind),
            );
            tracing::info!(item = %assignment.item_id, slot, "Planned item already published, slot consumed");
            return Ok(PublishOutcome::skipped(
                Some(assignment.item_id),
                Some(assignment.kind),
                slot,
            ));
        }

        let item = self
            .catalog
            .item_by_id(&assignment.item_id)
            .ok_or_else(|| SchedulerError::unknown_item(&assignment.item_id))?;
        let post = self.formatter.format(&item);

        let receipt = match self.channel.send(&post.primary).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(item = %item.id, slot, error = %e, "Primary send failed, slot will be retried");
                self.append_audit(
                    AuditEntry::new(PostStatus::Error, cycle_day, humanitarian_index)
                        .with_item(&item.id)
                        .with_kind(assignment.kind)
                        .with_error(e.to_string()),
                );
                return Err(e.into());
            }
        };

        let sub_attempts = self.send_secondaries(&post.secondary, &receipt).await;

        state.commit_publish(&item.id, &assignment.category_id, assignment.cursor_position);
        self.advance_slot(state, &proposed);
        self.store.save(state).map_err(SchedulerError::storage)?;
        self.append_audit(
            AuditEntry::new(PostStatus::Success, cycle_day, humanitarian_index)
                .with_item(&item.id)
                .with_kind(assignment.kind)
                .with_message_id(&receipt.message_id)
                .with_sub_attempts(sub_attempts),
        );

        tracing::info!(
            item = %item.id,
            message_id = %receipt.message_id,
            slot,
            "Published scheduled item"
        );

        Ok(PublishOutcome {
            status: PostStatus::Success,
            item_id: Some(item.id),
            kind: Some(assignment.kind),
            external_message_id: Some(receipt.message_id),
            slot: Some(slot),
        })
    }

    /// Publish the remaining slots of the day's plan in one call
    ///
    /// Individual failures are logged and do not stop the batch. The
    /// rotation indices advance exactly once after the batch, regardless
    /// of failures, and the day's quota is marked consumed. Slots already
    /// consumed by earlier single publishes are not replayed.
    pub async fn publish_batch(&self) -> SchedulerResult<BatchOutcome> {
        let mut guard = self.state.lock().await;
        let DispatchState { schedule: state, day_plan } = &mut *guard;

        let today = self.clock.today();
        state.roll_day_boundary(today);

        if state.daily_post_index >= self.config.posts_per_day {
            tracing::info!("Daily quota already consumed, batch is a no-op");
            return Ok(BatchOutcome {
                planned: 0,
                succeeded: 0,
                failed: 0,
                outcomes: Vec::new(),
            });
        }

        let (plan, proposed) = self.plan_for_today(state, day_plan, today);
        let (cycle_day, humanitarian_index) = (state.cycle_day, state.humanitarian_index);

        let start_slot = state.daily_post_index;
        let mut outcomes = Vec::with_capacity((self.config.posts_per_day - start_slot) as usize);
        let (mut succeeded, mut skipped, mut failed) = (0usize, 0usize, 0usize);

        for slot in start_slot..self.config.posts_per_day {
            if slot > start_slot {
                tokio::time::sleep(self.config.inter_post_delay).await;
            }

            let Some(assignment) = self.assignment_for_slot(&plan, slot, cycle_day) else {
                skipped += 1;
                self.append_audit(AuditEntry::new(
                    PostStatus::Skipped,
                    cycle_day,
                    humanitarian_index,
                ));
                outcomes.push(PublishOutcome::skipped(None, None, slot));
                continue;
            };

            if state.posted.contains(&assignment.item_id) {
                skipped += 1;
                self.append_audit(
                    AuditEntry::new(PostStatus::Skipped, cycle_day, humanitarian_index)
                        .with_item(&assignment.item_id)
                        .with_kind(assignment.kind),
                );
                outcomes.push(PublishOutcome::skipped(
                    Some(assignment.item_id),
                    Some(assignment.kind),
                    slot,
                ));
                continue;
            }

            let Some(item) = self.catalog.item_by_id(&assignment.item_id) else {
                failed += 1;
                self.append_audit(
                    AuditEntry::new(PostStatus::Error, cycle_day, humanitarian_index)
                        .with_item(&assignment.item_id)
                        .with_kind(assignment.kind)
                        .with_error("item missing from catalog"),
                );
                outcomes.push(PublishOutcome {
                    status: PostStatus::Error,
                    item_id: Some(assignment.item_id.clone()),
                    kind: Some(assignment.kind),
                    external_message_id: None,
                    slot: Some(slot),
                });
                continue;
            };

            let post = self.formatter.format(&item);
            match self.channel.send(&post.primary).await {
                Err(e) => {
                    failed += 1;
                    tracing::error!(item = %item.id, slot, error = %e, "Batch item failed, continuing");
                    self.append_audit(
                        AuditEntry::new(PostStatus::Error, cycle_day, humanitarian_index)
                            .with_item(&item.id)
                            .with_kind(assignment.kind)
                            .with_error(e.to_string()),
                    );
                    outcomes.push(PublishOutcome {
                        status: PostStatus::Error,
                        item_id: Some(item.id),
                        kind: Some(assignment.kind),
                        external_message_id: None,
                        slot: Some(slot),
                    });
                }
                Ok(receipt) => {
                    let sub_attempts = self.send_secondaries(&post.secondary, &receipt).await;
                    state.commit_publish(
                        &item.id,
                        &assignment.category_id,
                        assignment.cursor_position,
                    );
                    succeeded += 1;
                    self.append_audit(
                        AuditEntry::new(PostStatus::Success, cycle_day, humanitarian_index)
                            .with_item(&item.id)
                            .with_kind(assignment.kind)
                            .with_message_id(&receipt.message_id)
                            .with_sub_attempts(sub_attempts),
                    );
                    outcomes.push(PublishOutcome {
                        status: PostStatus::Success,
                        item_id: Some(item.id),
                        kind: Some(assignment.kind),
                        external_message_id: Some(receipt.message_id),
                        slot: Some(slot),
                    });
                }
            }
        }

        // The batch consumes the rest of the day regardless of failures
        state.adopt_rotation(&proposed);
        state.posts_today_count += (succeeded + skipped) as u32;
        state.daily_post_index = self.config.posts_per_day;
        self.store.save(state).map_err(SchedulerError::storage)?;

        tracing::info!(
            planned = outcomes.len(),
            succeeded,
            failed,
            "Batch publish finished"
        );

        Ok(BatchOutcome {
            planned: outcomes.len(),
            succeeded,
            failed,
            outcomes,
        })
    }

    /// Publish a uniformly random unposted item, outside the rotation
    ///
    /// Touches neither the rotation cursors nor the daily counters.
    pub async fn publish_random(&self) -> SchedulerResult<PublishOutcome> {
        let mut guard = self.state.lock().await;

        let unposted: Vec<ContentItem> = self
            .catalog
            .all_items()
            .into_iter()
            .filter(|item| !guard.schedule.posted.contains(&item.id))
            .collect();

        let item = unposted
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(SchedulerError::CatalogExhausted)?;

        self.publish_direct(&mut guard.schedule, item, PostKind::Random)
            .await
    }

    /// Publish a specific item by id, outside the rotation
    pub async fn publish_item(&self, id: &str) -> SchedulerResult<PublishOutcome> {
        let mut guard = self.state.lock().await;

        let item = self
            .catalog
            .item_by_id(id)
            .ok_or_else(|| SchedulerError::unknown_item(id))?;

        self.publish_direct(&mut guard.schedule, item, PostKind::Manual)
            .await
    }

    async fn publish_direct(
        &self,
        state: &mut ScheduleState,
        item: ContentItem,
        kind: PostKind,
    ) -> SchedulerResult<PublishOutcome> {
        let (cycle_day, humanitarian_index) = (state.cycle_day, state.humanitarian_index);
        let post = self.formatter.format(&item);

        let receipt = match self.channel.send(&post.primary).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(item = %item.id, error = %e, "Direct publish failed");
                self.append_audit(
                    AuditEntry::new(PostStatus::Error, cycle_day, humanitarian_index)
                        .with_item(&item.id)
                        .with_kind(kind)
                        .with_error(e.to_string()),
                );
                return Err(e.into());
            }
        };

        let sub_attempts = self.send_secondaries(&post.secondary, &receipt).await;

        state.mark_posted(&item.id);
        self.store.save(state).map_err(SchedulerError::storage)?;
        self.append_audit(
            AuditEntry::new(PostStatus::Success, cycle_day, humanitarian_index)
                .with_item(&item.id)
                .with_kind(kind)
                .with_message_id(&receipt.message_id)
                .with_sub_attempts(sub_attempts),
        );

        tracing::info!(item = %item.id, message_id = %receipt.message_id, ?kind, "Published item");

        Ok(PublishOutcome {
            status: PostStatus::Success,
            item_id: Some(item.id),
            kind: Some(kind),
            external_message_id: Some(receipt.message_id),
            slot: None,
        })
    }

    /// Assignment serving a quota slot, by role rather than plan position
    ///
    /// Slot 0 is the humanitarian slot; slot k >= 1 is the technical
    /// window offset k - 1. Tying slots to roles keeps them stable when
    /// exhaustion drops a category from the assignment list.
    fn assignment_for_slot(
        &self,
        plan: &DailyPlan,
        slot: u32,
        cycle_day: usize,
    ) -> Option<PostAssignment> {
        if slot == 0 {
            return plan
                .iter()
                .find(|a| a.kind == PostKind::Humanitarian)
                .cloned();
        }

        let t = self.config.families.technical.len();
        if t == 0 {
            return None;
        }
        let offset = slot as usize - 1;
        if offset >= TECH_WINDOW.min(t) {
            return None;
        }
        let category = &self.config.families.technical[(cycle_day + offset) % t];
        plan.iter()
            .find(|a| a.kind == PostKind::Technical && &a.category_id == category)
            .cloned()
    }

    /// Consume one quota slot; commit rotation indices when the day is done
    fn advance_slot(&self, state: &mut ScheduleState, proposed: &ScheduleState) {
        state.posts_today_count += 1;
        state.daily_post_index += 1;
        if state.daily_post_index >= self.config.posts_per_day {
            state.adopt_rotation(proposed);
            tracing::debug!("Daily quota reached, rotation indices committed");
        }
    }

    /// Send secondary payloads under the primary message, best-effort
    ///
    /// Each secondary send needs the discussion-thread id, which only
    /// becomes available after the channel processes the primary; if the
    /// bounded polling below times out, all secondaries are skipped rather
    /// than blocking the publish.
    async fn send_secondaries(
        &self,
        secondary: &[String],
        receipt: &SendReceipt,
    ) -> Vec<SubAttempt> {
        if secondary.is_empty() {
            return Vec::new();
        }

        let Some(thread_id) = self.resolve_thread(&receipt.message_id).await else {
            tracing::warn!(
                message_id = %receipt.message_id,
                "Thread resolution timed out, skipping follow-ups"
            );
            return secondary
                .iter()
                .enumerate()
                .map(|(index, _)| SubAttempt {
                    index,
                    status: PostStatus::Skipped,
                    error: Some("thread resolution timed out".to_string()),
                })
                .collect();
        };

        let mut attempts = Vec::with_capacity(secondary.len());
        for (index, payload) in secondary.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.inter_post_delay).await;
            }
            match self.channel.send_follow_up(payload, &thread_id).await {
                Ok(()) => attempts.push(SubAttempt {
                    index,
                    status: PostStatus::Success,
                    error: None,
                }),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Follow-up send failed");
                    attempts.push(SubAttempt {
                        index,
                        status: PostStatus::Error,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        attempts
    }

    /// Poll the channel for a thread id within the configured budget
    async fn resolve_thread(&self, message_id: &str) -> Option<String> {
        let deadline = tokio::time::Instant::now() + self.config.thread_resolve_timeout;
        loop {
            match self.channel.resolve_thread_id(message_id).await {
                Ok(Some(thread_id)) => return Some(thread_id),
                Ok(None) => {}
                Err(e) => tracing::warn!(message_id, error = %e, "Thread lookup failed"),
            }

            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(self.config.thread_resolve_interval).await;
        }
    }

    fn append_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.append(entry) {
            tracing::warn!(error = %e, "Failed to append audit entry");
        }
    }
}
