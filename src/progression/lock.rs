//! Derived lock state, rendered by the presentation layer

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::content::{ContentId, ContentTag, UnitId};

/// Why an item is locked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    #[default]
    None,
    PreviousContentIncomplete,
    PreviousUnitQuizNotPassed,
    PreviousUnitNeedsReview,
}

/// What is standing in the way
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Blocker {
    Item { id: ContentId, title: String, kind: ContentTag },
    Unit { id: UnitId, title: String },
}

/// Lock status of a single item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLock {
    pub locked: bool,
    pub reason: LockReason,
    pub blocked_by: Option<Blocker>,
}

impl ItemLock {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn locked(reason: LockReason, blocked_by: Blocker) -> Self {
        Self { locked: true, reason, blocked_by: Some(blocked_by) }
    }

    /// Human-readable explanation for a locked item
    pub fn message(&self) -> Option<String> {
        if !self.locked {
            return None;
        }

        let message = match (&self.reason, &self.blocked_by) {
            (LockReason::PreviousContentIncomplete, Some(Blocker::Item { kind, .. })) => {
                let action = match kind {
                    ContentTag::Video => "Complete the previous video",
                    ContentTag::Document => "Read the previous document",
                    ContentTag::Quiz => "Pass the previous quiz",
                };
                format!("{action} to unlock this content")
            }
            (LockReason::PreviousContentIncomplete, Some(Blocker::Unit { title, .. })) => {
                format!("Complete all content in {title} to unlock this unit")
            }
            (LockReason::PreviousUnitQuizNotPassed, Some(Blocker::Unit { title, .. })) => {
                format!("Pass the {title} quiz to unlock this unit")
            }
            (LockReason::PreviousUnitNeedsReview, Some(Blocker::Unit { title, .. })) => {
                format!("New content was added to {title}. Review it to continue")
            }
            _ => "This content is locked".into(),
        };

        Some(message)
    }
}

/// Lock status for every item in a course
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockState {
    items: HashMap<ContentId, ItemLock>,
}

impl LockState {
    pub fn insert(&mut self, id: ContentId, lock: ItemLock) {
        self.items.insert(id, lock);
    }

    pub fn get(&self, id: &str) -> Option<&ItemLock> {
        self.items.get(id)
    }

    /// Unknown items are reported locked
    pub fn is_locked(&self, id: &str) -> bool {
        self.items.get(id).is_none_or(|lock| lock.locked)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContentId, &ItemLock)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
