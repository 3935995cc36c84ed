//! A single stretch of uninterrupted playback

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::clock::elapsed_secs;
use super::segments::SegmentSet;
use crate::content::ContentId;

/// Sessions shorter than this (seconds of wall-clock time) are discarded
pub const MIN_SESSION_SECONDS: f64 = 0.5;

/// Speed-adjusted watch time, capped by the distance actually covered.
///
/// Playing at 4x for 10s while the position only moved 2s reports 6s, not 40s.
pub fn adjusted_time(real_seconds: f64, playback_rate: f64, start: f64, end: f64) -> f64 {
    let speed_adjusted = real_seconds * playback_rate;
    let covered = (end - start).abs() + playback_rate;
    speed_adjusted.min(covered).max(0.0)
}

/// A session that is currently playing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSession {
    pub content_id: ContentId,
    /// Unix timestamp (ms)
    pub started_at: i64,
    pub start_position: f64,
    pub playback_rate: f64,
}

impl OpenSession {
    pub fn new(content_id: ContentId, started_at: i64, start_position: f64, rate: f64) -> Self {
        Self { content_id, started_at, start_position, playback_rate: rate }
    }

    /// Wall-clock seconds since the session opened
    pub fn elapsed(&self, now: i64) -> f64 {
        elapsed_secs(self.started_at, now)
    }

    /// Close the session at `end_position`.
    ///
    /// Returns `None` when the session is shorter than
    /// [`MIN_SESSION_SECONDS`]; such sessions leave no trace.
    pub fn close(self, now: i64, end_position: f64, duration: f64) -> Option<WatchSession> {
        let real_time_seconds = self.elapsed(now);
        if real_time_seconds < MIN_SESSION_SECONDS {
            return None;
        }

        let segments_touched =
            SegmentSet::buckets_between(self.start_position, end_position, duration)
                .into_iter()
                .collect();

        Some(WatchSession {
            content_id: self.content_id,
            session_start: self.started_at,
            session_end: Some(now),
            real_time_seconds,
            playback_rate: self.playback_rate,
            start_position: self.start_position,
            end_position,
            segments_touched,
        })
    }
}

/// A closed watch session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSession {
    pub content_id: ContentId,
    pub session_start: i64,
    pub session_end: Option<i64>,
    pub real_time_seconds: f64,
    pub playback_rate: f64,
    pub start_position: f64,
    pub end_position: f64,
    pub segments_touched: BTreeSet<u32>,
}

impl WatchSession {
    pub fn adjusted_time(&self) -> f64 {
        adjusted_time(
            self.real_time_seconds,
            self.playback_rate,
            self.start_position,
            self.end_position,
        )
    }
}
