//! Player events, flush requests and the observer interface shared by the
//! video and document trackers

use serde::{Deserialize, Serialize};

use crate::api::{DocumentProgressUpdate, WatchUpdate};
use crate::content::ContentId;

/// Raw events from a video player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    Play { position: f64 },
    Pause { position: f64 },
    TimeUpdate { position: f64 },
    Seek { position: f64 },
    RateChange { rate: f64 },
    Ended,
    VisibilityHidden,
    VisibilityVisible,
    /// Periodic checkpoint from the flush timer
    Tick { position: f64 },
    Unmount,
    BeforeUnload,
}

/// A player event stamped with the time it happened, as recorded in replay
/// logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Unix timestamp (ms)
    pub at: i64,
    #[serde(flatten)]
    pub event: PlayerEvent,
}

/// How the view is going away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The component unmounts while the page stays alive
    Unmount,
    /// The page is hidden for good (mobile page-hide)
    PageHide,
    /// The tab or window is closing
    BeforeUnload,
}

impl Teardown {
    /// Delivery path that survives this kind of teardown
    pub fn delivery(&self) -> Delivery {
        match self {
            Self::Unmount => Delivery::Async,
            Self::PageHide | Self::BeforeUnload => Delivery::Blocking,
        }
    }
}

/// How a flush must be delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Normal round trip while the page is alive
    #[default]
    Async,
    /// Block until sent; the page may be gone before an async reply arrives
    Blocking,
}

/// What a flush writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlushPayload {
    Video { video_id: ContentId, update: WatchUpdate },
    Document { document_id: ContentId, update: DocumentProgressUpdate },
}

impl FlushPayload {
    pub fn content_id(&self) -> &str {
        match self {
            Self::Video { video_id, .. } => video_id,
            Self::Document { document_id, .. } => document_id,
        }
    }

    /// Unix timestamp (ms) carried by the update
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Video { update, .. } => update.timestamp,
            Self::Document { update, .. } => update.timestamp,
        }
    }

    /// Backend path the payload is written to
    pub fn path(&self) -> String {
        match self {
            Self::Video { video_id, .. } => format!("video/{video_id}/watch"),
            Self::Document { document_id, .. } => format!("document/{document_id}/progress"),
        }
    }
}

/// A progress write produced by a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flush {
    /// Increases with every flush from the same tracker
    pub sequence: u64,
    pub delivery: Delivery,
    pub is_final: bool,
    pub payload: FlushPayload,
}

/// Receives the outcome of flushes a tracker produced
pub trait FlushSource {
    /// The backend accepted the flush
    fn acknowledge(&mut self, sequence: u64);
    /// The flush failed; its data must go out with the next natural flush
    fn flush_failed(&mut self, sequence: u64);
    /// The flush will never be delivered and must not be resent
    fn flush_dropped(&mut self, sequence: u64);
}

/// Page-level signals shared by every tracker
pub trait SessionObserver {
    fn on_focus_change(&mut self, focused: bool) -> Option<Flush>;
    fn on_visibility_change(&mut self, visible: bool) -> Option<Flush>;
    fn on_teardown(&mut self, kind: Teardown) -> Option<Flush>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_event_deserializes_flat() {
        let json = r#"[{"at": 0, "event": "play", "position": 0},
                       {"at": 5000, "event": "rate_change", "rate": 2},
                       {"at": 9000, "event": "ended"}]"#;
        let events: Vec<TimedEvent> = serde_json::from_str(json).unwrap();

        assert_eq!(events[0].event, PlayerEvent::Play { position: 0.0 });
        assert_eq!(events[1].event, PlayerEvent::RateChange { rate: 2.0 });
        assert_eq!(events[2].at, 9000);
        assert_eq!(events[2].event, PlayerEvent::Ended);
    }

    #[test]
    fn closing_tab_requires_blocking_delivery() {
        assert_eq!(Teardown::BeforeUnload.delivery(), Delivery::Blocking);
        assert_eq!(Teardown::PageHide.delivery(), Delivery::Blocking);
        assert_eq!(Teardown::Unmount.delivery(), Delivery::Async);
    }

    #[test]
    fn payload_paths() {
        let payload =
            FlushPayload::Video { video_id: "v1".into(), update: WatchUpdate::default() };
        assert_eq!(payload.path(), "video/v1/watch");
        assert_eq!(payload.content_id(), "v1");
    }
}
