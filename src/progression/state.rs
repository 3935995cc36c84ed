//! Per-item and per-unit progression states

use serde::{Deserialize, Serialize};

/// Where a student stands on a single content item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    #[default]
    Locked,
    Unlocked,
    InProgress,
    Completed,
}

/// Events that move an item forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEvent {
    /// The preceding item (or unit gate) was completed
    PredecessorCompleted,
    /// First watch or view
    Started,
    /// 80% watched, marked as read, or quiz passed
    ThresholdReached,
}

impl ItemState {
    /// Derive the state by replaying the events the signals imply
    pub fn derive(locked: bool, complete: bool, started: bool) -> Self {
        if locked {
            return Self::Locked;
        }

        let mut state = Self::Locked.on(ItemEvent::PredecessorCompleted);
        if started {
            state = state.on(ItemEvent::Started);
        }
        if complete {
            state = state.on(ItemEvent::ThresholdReached);
        }
        state
    }

    /// Apply an event. Transitions only move forward; anything else is ignored.
    pub fn on(self, event: ItemEvent) -> Self {
        match (self, event) {
            (Self::Locked, ItemEvent::PredecessorCompleted) => Self::Unlocked,
            (Self::Unlocked, ItemEvent::Started) => Self::InProgress,
            (Self::Unlocked | Self::InProgress, ItemEvent::ThresholdReached) => Self::Completed,
            (state, _) => state,
        }
    }

    pub fn is_accessible(&self) -> bool {
        !matches!(self, Self::Locked)
    }
}

/// Unit-level status; only content changes can reopen a finished unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Open,
    NeedsReview,
}

/// Events affecting a unit's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEvent {
    /// An instructor added content after the student finished the unit
    ContentChanged,
    /// Every newly added item has been completed
    ReviewCompleted,
}

impl UnitStatus {
    pub fn on(self, event: UnitEvent) -> Self {
        match event {
            UnitEvent::ContentChanged => Self::NeedsReview,
            UnitEvent::ReviewCompleted => Self::Open,
        }
    }
}
