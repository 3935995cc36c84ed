//! Unlock computation
//!
//! Malformed or missing signals never raise errors here. They resolve to
//! "incomplete" and therefore "locked", which is the safe default for a
//! student-facing gate.

use std::collections::{HashMap, HashSet};

use crate::content::{ContentGraph, ContentId, ContentItem, ContentKind, UnitId, UnitNode};

use super::lock::{Blocker, ItemLock, LockReason, LockState};
use super::quiz::{QuizAttempt, QuizResults};
use super::review::{
    ProgressionConflict, ProgressionStatus, UnitReview, blocked_by_unit, outstanding_reviews,
};
use super::state::{ItemState, UnitEvent, UnitStatus};

/// Watch progress (percent) at which a video unlocks its successor
pub const UNLOCK_PROGRESS_PERCENT: f64 = 80.0;

/// Whether an item counts as complete for unlocking
pub fn is_item_complete(item: &ContentItem) -> bool {
    if item.malformed {
        return false;
    }

    match &item.kind {
        ContentKind::Video(v) => {
            v.is_completed || v.watched || v.watch_progress_percent >= UNLOCK_PROGRESS_PERCENT
        }
        ContentKind::Document(d) => d.is_read || d.is_completed,
        ContentKind::Quiz(q) => q.passed,
    }
}

/// Items unlocked within one sequence.
///
/// The first item is always unlocked; every other item is unlocked exactly
/// when its predecessor is complete.
pub fn compute_unlocked(sequence: &[ContentItem]) -> HashSet<ContentId> {
    let mut unlocked = HashSet::with_capacity(sequence.len());

    if let Some(first) = sequence.first() {
        unlocked.insert(first.id.clone());
    }

    for pair in sequence.windows(2) {
        if is_item_complete(&pair[0]) {
            unlocked.insert(pair[1].id.clone());
        }
    }

    unlocked
}

/// Whether every item of each unit is complete
pub fn unit_completion(units: &[UnitNode]) -> HashMap<UnitId, bool> {
    units.iter().map(|unit| (unit.id.clone(), unit.is_complete())).collect()
}

/// Whether the gate out of `unit` is satisfied
fn gate_passed(
    unit: &UnitNode,
    completion_by_unit: &HashMap<UnitId, bool>,
    quiz_results: &QuizResults,
) -> bool {
    if unit.quiz_gate.is_some() {
        quiz_results.passed(&unit.id)
    } else {
        completion_by_unit.get(&unit.id).copied().unwrap_or(false)
    }
}

/// Index of the first unit whose gate is not satisfied, if any unit after it
/// exists
fn first_failed_gate(
    units: &[UnitNode],
    completion_by_unit: &HashMap<UnitId, bool>,
    quiz_results: &QuizResults,
) -> Option<usize> {
    let last = units.len().checked_sub(1)?;
    units[..last]
        .iter()
        .position(|unit| !gate_passed(unit, completion_by_unit, quiz_results))
}

/// Which units the student may enter.
///
/// Unit 0 is always accessible. Unit `i` needs unit `i - 1` to be accessible
/// and its gate to be satisfied: a passed quiz when it has one, otherwise
/// complete content. Units missing from `completion_by_unit` count as
/// incomplete.
pub fn compute_unit_accessible(
    units: &[UnitNode],
    completion_by_unit: &HashMap<UnitId, bool>,
    quiz_results: &QuizResults,
) -> HashMap<UnitId, bool> {
    let cutoff = first_failed_gate(units, completion_by_unit, quiz_results);

    units
        .iter()
        .enumerate()
        .map(|(index, unit)| (unit.id.clone(), cutoff.is_none_or(|failed| index <= failed)))
        .collect()
}

/// Lock and progression decisions for a whole course
#[derive(Debug, Clone, Default)]
pub struct ProgressionEngine {
    graph: ContentGraph,
    quiz_results: QuizResults,
    reviews: Vec<UnitReview>,
}

impl ProgressionEngine {
    /// Create an engine seeded with the quiz standings embedded in the graph
    pub fn new(graph: ContentGraph) -> Self {
        let quiz_results = QuizResults::from_units(graph.units());
        Self { graph, quiz_results, reviews: Vec::new() }
    }

    pub fn graph(&self) -> &ContentGraph {
        &self.graph
    }

    pub fn quiz_results(&self) -> &QuizResults {
        &self.quiz_results
    }

    /// Record a quiz attempt; returns whether it became the unit's result.
    /// The quiz item follows the unit's best attempt, so a pass completes it.
    pub fn record_quiz_attempt(&mut self, attempt: QuizAttempt) -> bool {
        let unit_id = attempt.unit_id.clone();
        let became_result = self.quiz_results.record(attempt);

        if let (Some(best), Some(unit)) =
            (self.quiz_results.best(&unit_id), self.graph.unit_mut(&unit_id))
        {
            unit.record_quiz_result(best.passed, best.score_percent);
        }

        became_result
    }

    /// Replace the needs-review list
    pub fn set_reviews(&mut self, reviews: Vec<UnitReview>) {
        self.reviews = reviews;
    }

    /// Review entries that still block progression
    pub fn outstanding_reviews(&self) -> Vec<UnitReview> {
        outstanding_reviews(&self.graph, &self.reviews)
    }

    /// Accessibility of every unit, ignoring review blocking
    pub fn unit_access(&self) -> HashMap<UnitId, bool> {
        let units = self.graph.units();
        compute_unit_accessible(units, &unit_completion(units), &self.quiz_results)
    }

    /// The flagged unit blocking access to `unit_id`, if any
    pub fn blocked_by(&self, unit_id: &str) -> Option<UnitId> {
        blocked_by_unit(self.graph.units(), &self.outstanding_reviews(), unit_id)
    }

    /// Compute the lock state of every item in the course
    pub fn lock_state(&self) -> LockState {
        let units = self.graph.units();
        let completion = unit_completion(units);
        let cutoff = first_failed_gate(units, &completion, &self.quiz_results);
        let reviews = self.outstanding_reviews();

        let mut state = LockState::default();

        for (index, unit) in units.iter().enumerate() {
            if let Some(flagged) = blocked_by_unit(units, &reviews, &unit.id) {
                let lock = ItemLock::locked(
                    LockReason::PreviousUnitNeedsReview,
                    unit_blocker(&self.graph, &flagged),
                );
                lock_all(&mut state, unit, lock);
                continue;
            }

            if let Some(failed) = cutoff.filter(|&failed| index > failed) {
                let gate = &units[failed];
                let reason = if gate.quiz_gate.is_some() {
                    LockReason::PreviousUnitQuizNotPassed
                } else {
                    LockReason::PreviousContentIncomplete
                };
                let blocker = Blocker::Unit { id: gate.id.clone(), title: gate.title.clone() };
                lock_all(&mut state, unit, ItemLock::locked(reason, blocker));
                continue;
            }

            let unlocked = compute_unlocked(&unit.content);
            let mut previous: Option<&ContentItem> = None;

            for item in &unit.content {
                let lock = match previous {
                    Some(prev) if !unlocked.contains(&item.id) && !item.is_complete() => {
                        ItemLock::locked(
                            LockReason::PreviousContentIncomplete,
                            Blocker::Item {
                                id: prev.id.clone(),
                                title: prev.title.clone(),
                                kind: prev.tag(),
                            },
                        )
                    }
                    _ => ItemLock::open(),
                };
                state.insert(item.id.clone(), lock);
                previous = Some(item);
            }
        }

        state
    }

    /// Review status of a unit: flagged while it has outstanding new content
    pub fn unit_status(&self, unit_id: &str) -> UnitStatus {
        let flagged = self.outstanding_reviews().iter().any(|review| review.unit_id == unit_id);
        if flagged { UnitStatus::Open.on(UnitEvent::ContentChanged) } else { UnitStatus::Open }
    }

    /// Whether the student may open an item
    pub fn can_access(&self, item_id: &str) -> bool {
        !self.lock_state().is_locked(item_id)
    }

    /// The progression state of an item. `started` reports local activity
    /// (a watch session or view) the graph may not reflect yet.
    pub fn item_state(&self, item_id: &str, started: bool) -> ItemState {
        let Some(item) = self.graph.item(item_id) else {
            return ItemState::Locked;
        };

        let locked = self.lock_state().is_locked(item_id);
        ItemState::derive(locked, item.is_complete(), started || item.is_started())
    }

    /// Re-sync with the server's view of progression.
    ///
    /// The server's review list always replaces the local one. When the server
    /// reports the course blocked and that locks items the client believed
    /// open, the conflict is returned so the caller can show the blocking unit
    /// and its remaining items.
    pub fn reconcile(
        &mut self,
        status: &ProgressionStatus,
        reviews: Vec<UnitReview>,
    ) -> Option<ProgressionConflict> {
        let before = self.lock_state();
        self.reviews = reviews;

        if !status.is_blocked {
            return None;
        }

        let after = self.lock_state();
        let newly_locked = after.iter().any(|(id, lock)| lock.locked && !before.is_locked(id));
        if !newly_locked {
            return None;
        }

        let outstanding = self.outstanding_reviews();
        let blocking = self
            .graph
            .units()
            .iter()
            .find(|unit| outstanding.iter().any(|review| review.unit_id == unit.id))?;
        let review = outstanding.iter().find(|review| review.unit_id == blocking.id)?;

        let conflict = ProgressionConflict {
            blocking_unit: blocking.id.clone(),
            blocking_unit_title: blocking.title.clone(),
            remaining: review.remaining_items(&self.graph),
        };

        tracing::warn!(
            unit = %conflict.blocking_unit,
            remaining = conflict.remaining.len(),
            blocked = status.total_blocked_progression,
            "server reports progression blocked, local lock state re-synced"
        );

        Some(conflict)
    }
}

fn unit_blocker(graph: &ContentGraph, unit_id: &str) -> Blocker {
    let title = graph.unit(unit_id).map_or_else(|| unit_id.to_string(), |unit| unit.title.clone());
    Blocker::Unit { id: unit_id.to_string(), title }
}

fn lock_all(state: &mut LockState, unit: &UnitNode, lock: ItemLock) {
    for item in &unit.content {
        state.insert(item.id.clone(), lock.clone());
    }
}
