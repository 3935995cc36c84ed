//! Watch-time and reading-time tracking
//!
//! Trackers turn player and page events into tamper-resistant progress and
//! emit idempotent [`Flush`] requests; [`ProgressSync`] delivers them.

pub mod clock;
pub mod completion;
pub mod document;
pub mod event;
pub mod segments;
pub mod session;
pub mod sync;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{CompletionInput, is_completed};
pub use document::DocumentTracker;
pub use event::{
    Delivery, Flush, FlushPayload, FlushSource, PlayerEvent, SessionObserver, Teardown, TimedEvent,
};
pub use segments::{SEGMENT_SECONDS, SegmentSet};
pub use session::{MIN_SESSION_SECONDS, OpenSession, WatchSession, adjusted_time};
pub use sync::{DispatchOutcome, ProgressSync, run_tracker};
pub use tracker::{CumulativeWatchState, PositionCheck, WatchSessionTracker};
