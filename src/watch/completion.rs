//! Definitive video completion
//!
//! Stricter than the 80% unlock gate: this is the decision reported to the
//! backend with every flush, computed fresh each time.

/// Content shorter than this (seconds) uses the strict threshold
pub const SHORT_CONTENT_SECONDS: f64 = 30.0;
/// Threshold for short content (position and reported time)
pub const SHORT_CONTENT_THRESHOLD: f64 = 0.99;
/// Threshold for everything else
pub const COMPLETION_THRESHOLD: f64 = 0.98;

/// Absorbs float noise in ratios such as 19.8 / 20.0
const RATIO_EPSILON: f64 = 1e-9;

/// Signals available at flush time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionInput {
    pub duration: f64,
    /// Furthest position reached
    pub position: f64,
    /// Speed-adjusted time watched over the video's lifetime
    pub reported_time: f64,
    /// Seconds covered by watched segments
    pub segment_time: f64,
    pub is_final: bool,
    /// The player fired its natural `ended` event
    pub ended: bool,
}

fn reaches(value: f64, duration: f64, threshold: f64) -> bool {
    value.is_finite() && value / duration + RATIO_EPSILON >= threshold
}

/// Whether a video counts as watched
pub fn is_completed(input: &CompletionInput) -> bool {
    if input.is_final && input.ended {
        return true;
    }

    let duration = input.duration;
    if !duration.is_finite() || duration <= 0.0 {
        return false;
    }

    if duration < SHORT_CONTENT_SECONDS {
        return reaches(input.position, duration, SHORT_CONTENT_THRESHOLD)
            && reaches(input.reported_time, duration, SHORT_CONTENT_THRESHOLD);
    }

    reaches(input.position, duration, COMPLETION_THRESHOLD)
        && (reaches(input.reported_time, duration, COMPLETION_THRESHOLD)
            || reaches(input.segment_time, duration, COMPLETION_THRESHOLD))
}
