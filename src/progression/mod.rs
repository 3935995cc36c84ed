//! Lock and unlock decisions across a course
//!
//! Items unlock in sequence within a unit, units unlock through their quiz
//! gate (or complete content), and units flagged for review block everything
//! after them.

pub mod engine;
pub mod lock;
pub mod quiz;
pub mod review;
pub mod state;

pub use engine::{
    ProgressionEngine, UNLOCK_PROGRESS_PERCENT, compute_unit_accessible, compute_unlocked,
    is_item_complete, unit_completion,
};
pub use lock::{Blocker, ItemLock, LockReason, LockState};
pub use quiz::{QuizAttempt, QuizResults};
pub use review::{
    ProgressionConflict, ProgressionStatus, RemainingItem, UnitReview, blocked_by_unit,
    outstanding_reviews,
};
pub use state::{ItemEvent, ItemState, UnitEvent, UnitStatus};
