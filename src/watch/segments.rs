//! Coverage of a video in 5-second buckets
//!
//! Watching the same stretch twice marks the same buckets, so coverage
//! measures how much of the video was seen, not how long was spent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Width of one coverage bucket in seconds
pub const SEGMENT_SECONDS: f64 = 5.0;

/// Set of watched bucket indices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSet {
    buckets: BTreeSet<u32>,
}

impl SegmentSet {
    /// Number of buckets in a video of `duration` seconds
    pub fn total_segments(duration: f64) -> u32 {
        if duration.is_finite() && duration > 0.0 {
            (duration / SEGMENT_SECONDS).ceil() as u32
        } else {
            0
        }
    }

    /// Bucket indices touched by playing from `start` to `end`.
    ///
    /// Empty when nothing was played. A bucket counts as touched only if the
    /// interval actually enters it, so ending exactly on a boundary does not
    /// mark the next bucket. Buckets past `duration` are never produced, and
    /// nothing is produced while the duration is unknown.
    pub fn buckets_between(start: f64, end: f64, duration: f64) -> Vec<u32> {
        if !start.is_finite() || !end.is_finite() || Self::total_segments(duration) == 0 {
            return Vec::new();
        }

        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        let lo = lo.max(0.0);
        let hi = hi.min(duration);
        if hi <= lo {
            return Vec::new();
        }

        let first = (lo / SEGMENT_SECONDS).floor() as u32;
        let last = ((hi / SEGMENT_SECONDS).ceil() as u32).saturating_sub(1).max(first);

        (first..=last).collect()
    }

    /// Mark every bucket between `start` and `end`; returns how many were new
    pub fn mark_interval(&mut self, start: f64, end: f64, duration: f64) -> usize {
        Self::buckets_between(start, end, duration)
            .into_iter()
            .filter(|bucket| self.buckets.insert(*bucket))
            .count()
    }

    /// Mark buckets recorded elsewhere (e.g. a closed session)
    pub fn extend(&mut self, buckets: impl IntoIterator<Item = u32>) {
        self.buckets.extend(buckets);
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn contains(&self, bucket: u32) -> bool {
        self.buckets.contains(&bucket)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets.iter().copied()
    }

    /// Seconds of the video covered, capped at the duration
    pub fn covered_seconds(&self, duration: f64) -> f64 {
        let covered = self.buckets.len() as f64 * SEGMENT_SECONDS;
        if duration.is_finite() && duration > 0.0 { covered.min(duration) } else { covered }
    }
}
