//! Daily rotation planning
//!
//! Pure plan computation: given the current schedule state and a catalog
//! snapshot, decide which items would be published today and what the
//! state would look like afterwards. Nothing here performs side effects;
//! the dispatcher decides if and when a proposed state is committed.
//!
//! A day's plan holds up to four assignments: one humanitarian slot picked
//! round-robin, and three technical slots picked from a sliding window of
//! width three over the technical category list. Each technical category
//! therefore stays active for three consecutive days before rotating out.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::state::{CategoryFamilies, ScheduleState};
use crate::catalog::CatalogIndex;

/// Width of the technical sliding window (dwell period in days)
pub const TECH_WINDOW: usize = 3;

/// Which rotation rule (or manual path) produced a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    /// Daily humanitarian round-robin slot
    Humanitarian,
    /// Technical sliding-window slot
    Technical,
    /// Ad hoc random pick outside the rotation
    Random,
    /// Explicitly requested item
    Manual,
}

/// One planned publish within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAssignment {
    /// Item to publish
    pub item_id: String,

    /// Category the item was drawn from
    pub category_id: String,

    /// Position in the category's item list that was consumed
    pub cursor_position: usize,

    /// Family the slot belongs to
    pub kind: PostKind,
}

/// Ordered list of a day's planned publishes (0 to 4 entries)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPlan {
    pub assignments: Vec<PostAssignment>,
}

impl DailyPlan {
    /// Number of planned assignments
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assignment at a quota slot, if the plan reaches that far
    pub fn get(&self, slot: usize) -> Option<&PostAssignment> {
        self.assignments.get(slot)
    }

    /// Iterate over the assignments in order
    pub fn iter(&self) -> std::slice::Iter<'_, PostAssignment> {
        self.assignments.iter()
    }
}

/// First unposted item scanning forward from `cursor`
///
/// Wraps around the list iff `wrap` is set; otherwise the scan stops at
/// the end. Returns the item id and the position that was consumed.
fn next_unposted(
    items: &[String],
    cursor: usize,
    posted: &HashSet<String>,
    wrap: bool,
) -> Option<(String, usize)> {
    if items.is_empty() {
        return None;
    }

    let len = items.len();
    if wrap {
        let start = cursor % len;
        for offset in 0..len {
            let pos = (start + offset) % len;
            if !posted.contains(&items[pos]) {
                return Some((items[pos].clone(), pos));
            }
        }
        None
    } else {
        items[cursor.min(len)..]
            .iter()
            .enumerate()
            .find(|(_, id)| !posted.contains(*id))
            .map(|(offset, id)| (id.clone(), cursor + offset))
    }
}

/// Compute one day's publish plan
///
/// Pure: inputs are not mutated. The returned state is the proposal with
/// cursors advanced and the planned items marked as consumed, as if the
/// whole plan were published. Callers must have applied the epoch-rollover
/// check before invoking this (see `ScheduleState::rollover_if_exhausted`).
pub fn plan_daily_posts(
    state: &ScheduleState,
    catalog: &CatalogIndex,
    families: &CategoryFamilies,
    reset_on_end: bool,
) -> (DailyPlan, ScheduleState) {
    let mut proposed = state.clone();
    let mut assignments = Vec::with_capacity(1 + TECH_WINDOW);

    // Humanitarian slot: one category per day, strict round-robin. The
    // index advances even when the category is exhausted, so the same
    // category never serves two consecutive days.
    let h = families.humanitarian.len();
    if h > 0 {
        let category = &families.humanitarian[proposed.humanitarian_index % h];
        if let Some((item_id, pos)) = next_unposted(
            catalog.items_in(category),
            proposed.cursor(category),
            &proposed.posted,
            reset_on_end,
        ) {
            proposed.category_cursor.insert(category.clone(), pos + 1);
            proposed.posted.insert(item_id.clone());
            assignments.push(PostAssignment {
                item_id,
                category_id: category.clone(),
                cursor_position: pos,
                kind: PostKind::Humanitarian,
            });
        } else {
            tracing::debug!(%category, "Humanitarian slot omitted, category exhausted");
        }
        proposed.humanitarian_index = (proposed.humanitarian_index + 1) % h;
    }

    // Technical slots: three categories from the sliding window. The
    // window position advances once per day, not once per slot.
    let t = families.technical.len();
    if t > 0 {
        for offset in 0..TECH_WINDOW.min(t) {
            let category = &families.technical[(state.cycle_day + offset) % t];
            if let Some((item_id, pos)) = next_unposted(
                catalog.items_in(category),
                proposed.cursor(category),
                &proposed.posted,
                reset_on_end,
            ) {
                proposed.category_cursor.insert(category.clone(), pos + 1);
                proposed.posted.insert(item_id.clone());
                assignments.push(PostAssignment {
                    item_id,
                    category_id: category.clone(),
                    cursor_position: pos,
                    kind: PostKind::Technical,
                });
            } else {
                tracing::debug!(%category, "Technical slot omitted, category exhausted");
            }
        }
        proposed.cycle_day = (state.cycle_day + 1) % t;
    }

    (DailyPlan { assignments }, proposed)
}

/// Forecast the next `days` plans without side effects
///
/// Chains each proposed state into the next call starting from a copy of
/// `state`, applying the epoch-rollover rule before each simulated day.
pub fn preview_next_posts(
    state: &ScheduleState,
    catalog: &CatalogIndex,
    families: &CategoryFamilies,
    days: usize,
    reset_on_end: bool,
) -> Vec<DailyPlan> {
    let mut sim = state.clone();
    let mut plans = Vec::with_capacity(days);

    for _ in 0..days {
        sim.rollover_if_exhausted(catalog.total);
        let (plan, next) = plan_daily_posts(&sim, catalog, families, reset_on_end);
        plans.push(plan);
        sim = next;
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogIndex, ContentItem, JsonCatalog};

    /// 3 technical categories (A, B, C) and 2 humanitarian (X, Y),
    /// 5 items each: a0..a4, b0..b4, ..., y0..y4.
    fn fixture() -> (CatalogIndex, CategoryFamilies) {
        let mut items = Vec::new();
        for cat in ["a", "b", "c", "x", "y"] {
            for i in 0..5 {
                items.push(ContentItem::new(
                    format!("{cat}{i}"),
                    cat,
                    format!("{cat}{i} title"),
                    "",
                ));
            }
        }
        let catalog = JsonCatalog::from_items(items);
        let families = CategoryFamilies::new(
            vec!["x".to_string(), "y".to_string()],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        (CatalogIndex::from_catalog(&catalog), families)
    }

    fn categories_of(plan: &DailyPlan, kind: PostKind) -> Vec<&str> {
        plan.iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.category_id.as_str())
            .collect()
    }

    #[test]
    fn test_plan_is_pure() {
        let (catalog, families) = fixture();
        let state = ScheduleState::default();

        let (_, _) = plan_daily_posts(&state, &catalog, &families, true);
        assert_eq!(state, ScheduleState::default());
    }

    #[test]
    fn test_day_one_plan() {
        let (catalog, families) = fixture();
        let state = ScheduleState::default();

        let (plan, proposed) = plan_daily_posts(&state, &catalog, &families, true);

        assert_eq!(plan.len(), 4);
        assert_eq!(categories_of(&plan, PostKind::Humanitarian), vec!["x"]);
        assert_eq!(categories_of(&plan, PostKind::Technical), vec!["a", "b", "c"]);
        assert_eq!(plan.assignments[0].item_id, "x0");

        assert_eq!(proposed.cycle_day, 1);
        assert_eq!(proposed.humanitarian_index, 1);
        assert_eq!(proposed.cursor("x"), 1);
        assert_eq!(proposed.cursor("a"), 1);
    }

    #[test]
    fn test_three_day_scenario() {
        // Day 1: technical A,B,C and humanitarian X.
        // Day 2: technical B,C,A and humanitarian Y.
        // Day 3: technical C,A,B and humanitarian X again, next item.
        let (catalog, families) = fixture();
        let plans = preview_next_posts(&ScheduleState::default(), &catalog, &families, 3, true);

        assert_eq!(categories_of(&plans[0], PostKind::Technical), vec!["a", "b", "c"]);
        assert_eq!(categories_of(&plans[1], PostKind::Technical), vec!["b", "c", "a"]);
        assert_eq!(categories_of(&plans[2], PostKind::Technical), vec!["c", "a", "b"]);

        assert_eq!(categories_of(&plans[0], PostKind::Humanitarian), vec!["x"]);
        assert_eq!(categories_of(&plans[1], PostKind::Humanitarian), vec!["y"]);
        assert_eq!(categories_of(&plans[2], PostKind::Humanitarian), vec!["x"]);

        // Day 3's X pick is a different item than day 1's
        assert_eq!(plans[0].assignments[0].item_id, "x0");
        assert_eq!(plans[2].assignments[0].item_id, "x1");
    }

    #[test]
    fn test_cycle_day_advances_once_per_day() {
        let (catalog, families) = fixture();
        let state = ScheduleState::default();

        let (_, proposed) = plan_daily_posts(&state, &catalog, &families, true);
        assert_eq!(proposed.cycle_day, 1);
    }

    #[test]
    fn test_exhausted_category_omits_slot() {
        let (catalog, families) = fixture();
        let mut state = ScheduleState::default();
        for i in 0..5 {
            state.posted.insert(format!("x{i}"));
        }

        let (plan, proposed) = plan_daily_posts(&state, &catalog, &families, true);

        assert_eq!(plan.len(), 3);
        assert!(categories_of(&plan, PostKind::Humanitarian).is_empty());
        // Index still advanced so Y serves tomorrow
        assert_eq!(proposed.humanitarian_index, 1);
    }

    #[test]
    fn test_no_wrap_stops_at_end() {
        let (catalog, families) = fixture();
        let mut state = ScheduleState::default();
        state.category_cursor.insert("x".to_string(), 5);

        let (plan, _) = plan_daily_posts(&state, &catalog, &families, false);
        assert!(categories_of(&plan, PostKind::Humanitarian).is_empty());

        let (plan, _) = plan_daily_posts(&state, &catalog, &families, true);
        assert_eq!(categories_of(&plan, PostKind::Humanitarian), vec!["x"]);
    }

    #[test]
    fn test_wrap_skips_posted_items() {
        let (catalog, families) = fixture();
        let mut state = ScheduleState::default();
        state.category_cursor.insert("a".to_string(), 4);
        state.posted.insert("a4".to_string());

        let (plan, _) = plan_daily_posts(&state, &catalog, &families, true);
        let tech: Vec<_> = plan
            .iter()
            .filter(|a| a.category_id == "a")
            .map(|a| a.item_id.as_str())
            .collect();
        assert_eq!(tech, vec!["a0"]);
    }

    #[test]
    fn test_preview_has_no_side_effects() {
        let (catalog, families) = fixture();
        let state = ScheduleState::default();

        let _ = preview_next_posts(&state, &catalog, &families, 10, true);
        assert_eq!(state, ScheduleState::default());
    }

    #[test]
    fn test_preview_never_repeats_within_catalog_epoch() {
        let (catalog, families) = fixture();
        // 25 items, 4 per day: the first 6 days cannot repeat an item
        let plans = preview_next_posts(&ScheduleState::default(), &catalog, &families, 6, true);

        let mut seen = HashSet::new();
        for plan in &plans {
            for assignment in plan.iter() {
                assert!(
                    seen.insert(assignment.item_id.clone()),
                    "item {} planned twice",
                    assignment.item_id
                );
            }
        }
    }

    #[test]
    fn test_technical_dwell_is_three_consecutive_days() {
        let (catalog, families) = fixture();
        let t = families.period();
        let plans = preview_next_posts(&ScheduleState::default(), &catalog, &families, t, true);

        for cat in &families.technical {
            let active: Vec<usize> = plans
                .iter()
                .enumerate()
                .filter(|(_, p)| {
                    categories_of(p, PostKind::Technical).contains(&cat.as_str())
                })
                .map(|(day, _)| day)
                .collect();
            assert_eq!(active.len(), TECH_WINDOW, "category {cat} wrong dwell");
        }
    }

    #[test]
    fn test_unknown_category_yields_empty_slot() {
        let catalog = JsonCatalog::from_items(vec![ContentItem::new("a0", "a", "t", "")]);
        let index = CatalogIndex::from_catalog(&catalog);
        let families = CategoryFamilies::new(
            vec!["missing".to_string()],
            vec!["a".to_string()],
        );

        let (plan, _) = plan_daily_posts(&ScheduleState::default(), &index, &families, true);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.assignments[0].category_id, "a");
    }
}
