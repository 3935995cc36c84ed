//! Content model for course units
//!
//! Raw payload types mirror the backend's loosely-typed JSON. The typed
//! [`ContentItem`] and [`UnitNode`] are what the rest of the crate works with;
//! completion signals are validated once, when the graph is built.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier of a content item
pub type ContentId = String;

/// Opaque identifier of a unit
pub type UnitId = String;

/// A video as returned by `GET /courses/{id}/units`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVideo {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub arranged_order: Option<i64>,
    pub order: Option<i64>,
    pub sequence: Option<i64>,
    /// Length in seconds
    pub duration: Option<f64>,
    /// Watch progress, 0-100
    #[serde(alias = "progress")]
    pub watch_progress: Option<f64>,
    pub is_completed: Option<bool>,
    pub watched: Option<bool>,
}

/// A reading material as returned by `GET /courses/{id}/units`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub arranged_order: Option<i64>,
    pub order: Option<i64>,
    pub sequence: Option<i64>,
    pub is_read: Option<bool>,
    pub is_completed: Option<bool>,
}

/// The quiz pool a unit declares, with the student's standing on it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuizPool {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub attempts_taken: u32,
    pub passed: Option<bool>,
    #[serde(alias = "bestScore")]
    pub score_percent: Option<f64>,
}

/// A unit as returned by `GET /courses/{id}/units`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUnit {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub order: Option<i64>,
    #[serde(default)]
    pub videos: Vec<RawVideo>,
    #[serde(default, alias = "documents")]
    pub reading_materials: Vec<RawDocument>,
    #[serde(alias = "quiz")]
    pub quiz_pool: Option<RawQuizPool>,
}

/// Reasons a completion signal is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A numeric field is negative, NaN or infinite
    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidNumber { field: &'static str, value: f64 },

    /// Progress outside of 0-100
    #[error("watch progress {0} is outside 0-100")]
    ProgressOutOfRange(f64),

    /// The item has no identifier
    #[error("content item has no id")]
    MissingId,
}

/// Video completion signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSignals {
    pub duration_seconds: f64,
    pub watch_progress_percent: f64,
    pub is_completed: bool,
    pub watched: bool,
}

impl VideoSignals {
    /// Validate the raw video fields
    pub fn from_raw(raw: &RawVideo) -> Result<Self, ValidationError> {
        if raw.id.is_empty() {
            return Err(ValidationError::MissingId);
        }

        let duration_seconds = non_negative("duration", raw.duration.unwrap_or(0.0))?;
        let watch_progress_percent =
            non_negative("watchProgress", raw.watch_progress.unwrap_or(0.0))?;
        if watch_progress_percent > 100.0 {
            return Err(ValidationError::ProgressOutOfRange(watch_progress_percent));
        }

        Ok(Self {
            duration_seconds,
            watch_progress_percent,
            is_completed: raw.is_completed.unwrap_or(false),
            watched: raw.watched.unwrap_or(false),
        })
    }
}

/// Document completion signals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSignals {
    pub is_read: bool,
    pub is_completed: bool,
}

/// Quiz completion signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizSignals {
    pub attempts_taken: u32,
    pub passed: bool,
    pub score_percent: Option<f64>,
}

impl QuizSignals {
    pub fn from_raw(raw: &RawQuizPool) -> Self {
        Self {
            attempts_taken: raw.attempts_taken,
            passed: raw.passed.unwrap_or(false),
            score_percent: raw.score_percent.filter(|s| s.is_finite()),
        }
    }
}

/// Type-specific payload of a content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentKind {
    Video(VideoSignals),
    Document(DocumentSignals),
    Quiz(QuizSignals),
}

impl ContentKind {
    /// Discriminant without the payload
    pub fn tag(&self) -> ContentTag {
        match self {
            Self::Video(_) => ContentTag::Video,
            Self::Document(_) => ContentTag::Document,
            Self::Quiz(_) => ContentTag::Quiz,
        }
    }
}

/// Kind of a content item, for display and lock reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTag {
    Video,
    Document,
    Quiz,
}

impl ContentTag {
    /// Lowercase display name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Document => "document",
            Self::Quiz => "quiz",
        }
    }
}

/// A single unit of learning content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub title: String,
    /// Resolved sort key (`+inf` for the unit quiz)
    pub order: f64,
    /// Position in the merged source collections (videos, documents, quiz)
    pub original_index: usize,
    pub kind: ContentKind,
    /// Set when the completion signals failed validation
    #[serde(default)]
    pub malformed: bool,
}

impl ContentItem {
    /// Whether the item counts as complete for unlocking purposes
    pub fn is_complete(&self) -> bool {
        crate::progression::is_item_complete(self)
    }

    pub fn tag(&self) -> ContentTag {
        self.kind.tag()
    }

    /// Whether the student has started this item at all
    pub fn is_started(&self) -> bool {
        match &self.kind {
            ContentKind::Video(v) => v.watch_progress_percent > 0.0 || v.is_completed,
            ContentKind::Document(d) => d.is_read || d.is_completed,
            ContentKind::Quiz(q) => q.attempts_taken > 0,
        }
    }
}

/// Quiz summary gating progression out of a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizGate {
    pub quiz_id: ContentId,
    pub title: String,
    pub signals: QuizSignals,
}

/// An ordered group of content items, optionally gated by a quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitNode {
    pub id: UnitId,
    pub title: String,
    pub order: i64,
    pub content: Vec<ContentItem>,
    pub quiz_gate: Option<QuizGate>,
}

impl UnitNode {
    /// Whether every item in the unit is complete
    pub fn is_complete(&self) -> bool {
        self.content.iter().all(ContentItem::is_complete)
    }

    /// Find an item by id
    pub fn item(&self, id: &str) -> Option<&ContentItem> {
        self.content.iter().find(|item| item.id == id)
    }

    /// Count a new quiz attempt and show `passed` / `score_percent` as the
    /// unit's standing, on both the gate and the quiz item
    pub fn record_quiz_result(&mut self, passed: bool, score_percent: Option<f64>) {
        let Some(gate) = &mut self.quiz_gate else {
            return;
        };
        gate.signals.attempts_taken += 1;
        gate.signals.passed = passed;
        gate.signals.score_percent = score_percent;

        for item in &mut self.content {
            if let ContentKind::Quiz(signals) = &mut item.kind {
                *signals = gate.signals.clone();
            }
        }
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidNumber { field, value })
    }
}
