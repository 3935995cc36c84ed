//! Request and response bodies for the course backend

use serde::{Deserialize, Serialize};

/// Body of `POST /video/{id}/watch`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchUpdate {
    /// Speed-adjusted seconds watched since the last acknowledged flush
    pub time_spent: f64,
    /// Playback position in seconds
    pub current_time: f64,
    pub duration: f64,
    pub playback_rate: f64,
    pub is_completed: bool,
    /// Number of distinct 5-second segments watched
    pub segments_watched: u32,
    pub total_segments: u32,
    /// Sent while the player is being torn down
    pub is_final: bool,
    /// Unix timestamp (ms)
    pub timestamp: i64,
}

/// Body of `POST /document/{id}/progress`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProgressUpdate {
    pub is_read: bool,
    /// Unix timestamp (ms) of the mark-as-read action
    pub read_at: Option<i64>,
    /// Seconds spent reading since the last acknowledged flush
    pub reading_time: f64,
    pub course_id: String,
    pub unit_id: String,
    /// Unix timestamp (ms)
    pub timestamp: i64,
}

/// Response of `GET /video/{id}/resume-position`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePosition {
    #[serde(default)]
    pub has_resume_position: bool,
    #[serde(default)]
    pub current_position: f64,
    #[serde(default)]
    pub video_duration: f64,
    #[serde(default)]
    pub last_watched: Option<String>,
}

/// Response of `GET /unit/{id}/quiz/availability`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAvailability {
    #[serde(default, alias = "isAvailable")]
    pub available: bool,
    #[serde(default)]
    pub attempts_taken: u32,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub passed: bool,
    #[serde(default, alias = "message")]
    pub reason: Option<String>,
}

/// Response of `POST /unit/{id}/quiz/generate`. The quiz itself is opaque here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    #[serde(alias = "_id", alias = "quizId")]
    pub id: String,
    #[serde(default)]
    pub questions: Vec<serde_json::Value>,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
}

/// Acknowledgement of a progress write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body returned by the backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default, alias = "error")]
    pub message: String,
    /// Unit whose pending review blocks the write (409 / 423 only)
    #[serde(default, alias = "blockingUnit", alias = "unitId")]
    pub blocking_unit_id: Option<String>,
}

/// The backend answers either with the bare payload or wrapped in `data`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_update_uses_camel_case() {
        let update = WatchUpdate { time_spent: 12.5, is_final: true, ..Default::default() };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["timeSpent"], 12.5);
        assert_eq!(json["isFinal"], true);
        assert!(json.get("segmentsWatched").is_some());
    }

    #[test]
    fn envelope_accepts_both_shapes() {
        let wrapped: Envelope<ResumePosition> =
            serde_json::from_str(r#"{"data":{"hasResumePosition":true,"currentPosition":42}}"#)
                .unwrap();
        assert_eq!(wrapped.into_inner().current_position, 42.0);

        let bare: Envelope<ResumePosition> =
            serde_json::from_str(r#"{"hasResumePosition":false}"#).unwrap();
        assert!(!bare.into_inner().has_resume_position);
    }

    #[test]
    fn envelope_unwraps_lists() {
        let units: Envelope<Vec<crate::content::RawUnit>> =
            serde_json::from_str(r#"{"data":[{"_id":"u1"}]}"#).unwrap();
        assert_eq!(units.into_inner()[0].id, "u1");
    }
}
