//! Reading-time tracking for documents
//!
//! Documents are never completed by dwell time. Reading time is recorded for
//! analytics only; the read flag changes solely through [`DocumentTracker::mark_as_read`].

use std::collections::BTreeMap;

use super::clock::{Clock, SystemClock, elapsed_secs};
use super::event::{Delivery, Flush, FlushPayload, FlushSource, SessionObserver, Teardown};
use super::session::MIN_SESSION_SECONDS;
use crate::api::DocumentProgressUpdate;
use crate::content::{ContentId, UnitId};

/// Tracks how long a document is read and whether the student marked it read
#[derive(Debug)]
pub struct DocumentTracker<C: Clock = SystemClock> {
    document_id: ContentId,
    course_id: String,
    unit_id: UnitId,
    clock: C,
    /// The document is on screen
    viewing: bool,
    visible: bool,
    focused: bool,
    /// Start of the current reading stretch (ms)
    reading_since: Option<i64>,
    unflushed_seconds: f64,
    lifetime_seconds: f64,
    is_read: bool,
    read_at: Option<i64>,
    next_sequence: u64,
    in_flight: BTreeMap<u64, f64>,
    /// Read flag of the last issued flush
    last_issued: Option<bool>,
}

impl DocumentTracker<SystemClock> {
    pub fn new(
        document_id: impl Into<ContentId>,
        course_id: impl Into<String>,
        unit_id: impl Into<UnitId>,
    ) -> Self {
        Self::with_clock(document_id, course_id, unit_id, SystemClock)
    }
}

impl<C: Clock> DocumentTracker<C> {
    pub fn with_clock(
        document_id: impl Into<ContentId>,
        course_id: impl Into<String>,
        unit_id: impl Into<UnitId>,
        clock: C,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            course_id: course_id.into(),
            unit_id: unit_id.into(),
            clock,
            viewing: false,
            visible: true,
            focused: true,
            reading_since: None,
            unflushed_seconds: 0.0,
            lifetime_seconds: 0.0,
            is_read: false,
            read_at: None,
            next_sequence: 1,
            in_flight: BTreeMap::new(),
            last_issued: Some(false),
        }
    }

    /// Start from the read flag the backend already holds
    pub fn already_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self.last_issued = Some(is_read);
        self
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn is_reading(&self) -> bool {
        self.reading_since.is_some()
    }

    /// Reading time over the tracker's lifetime, excluding the open stretch
    pub fn lifetime_reading_time(&self) -> f64 {
        self.lifetime_seconds
    }

    pub fn pending_time(&self) -> f64 {
        self.unflushed_seconds + self.in_flight.values().sum::<f64>()
    }

    /// The document was opened
    pub fn on_view(&mut self) {
        self.viewing = true;
        self.resume();
    }

    /// The student explicitly marks the document as read
    pub fn mark_as_read(&mut self) -> Option<Flush> {
        self.close_stretch();
        self.resume();
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(self.clock.now_ms());
            tracing::debug!(document = %self.document_id, "marked as read");
        }
        self.flush(false, Delivery::Async)
    }

    /// Periodic checkpoint
    pub fn on_tick(&mut self) -> Option<Flush> {
        let now = self.clock.now_ms();
        if self.reading_since.is_some_and(|since| elapsed_secs(since, now) >= MIN_SESSION_SECONDS)
        {
            self.close_stretch();
            self.resume();
        }
        self.flush(false, Delivery::Async)
    }

    fn resume(&mut self) {
        if self.viewing && self.visible && self.focused && self.reading_since.is_none() {
            self.reading_since = Some(self.clock.now_ms());
        }
    }

    fn close_stretch(&mut self) {
        let Some(since) = self.reading_since.take() else {
            return;
        };

        let seconds = elapsed_secs(since, self.clock.now_ms());
        if seconds < MIN_SESSION_SECONDS {
            tracing::debug!(
                document = %self.document_id,
                seconds,
                "discarding short reading stretch"
            );
            return;
        }

        self.unflushed_seconds += seconds;
        self.lifetime_seconds += seconds;
    }

    fn teardown(&mut self, kind: Teardown) -> Option<Flush> {
        self.close_stretch();
        self.viewing = false;
        self.flush(true, kind.delivery())
    }

    /// Build a flush, or `None` when nothing changed since the last one
    pub fn flush(&mut self, is_final: bool, delivery: Delivery) -> Option<Flush> {
        let reading_time = self.unflushed_seconds;
        if reading_time <= 0.0 && self.last_issued == Some(self.is_read) {
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.unflushed_seconds = 0.0;
        self.in_flight.insert(sequence, reading_time);
        self.last_issued = Some(self.is_read);

        let update = DocumentProgressUpdate {
            is_read: self.is_read,
            read_at: self.read_at,
            reading_time,
            course_id: self.course_id.clone(),
            unit_id: self.unit_id.clone(),
            timestamp: self.clock.now_ms(),
        };

        Some(Flush {
            sequence,
            delivery,
            is_final,
            payload: FlushPayload::Document { document_id: self.document_id.clone(), update },
        })
    }
}

impl<C: Clock> FlushSource for DocumentTracker<C> {
    fn acknowledge(&mut self, sequence: u64) {
        self.in_flight.remove(&sequence);
    }

    fn flush_failed(&mut self, sequence: u64) {
        if let Some(seconds) = self.in_flight.remove(&sequence) {
            self.unflushed_seconds += seconds;
        }
        self.last_issued = None;
    }

    fn flush_dropped(&mut self, sequence: u64) {
        self.in_flight.remove(&sequence);
    }
}

impl<C: Clock> SessionObserver for DocumentTracker<C> {
    /// Reading pauses while the window is unfocused
    fn on_focus_change(&mut self, focused: bool) -> Option<Flush> {
        self.focused = focused;
        if focused {
            self.resume();
        } else {
            self.close_stretch();
        }
        None
    }

    fn on_visibility_change(&mut self, visible: bool) -> Option<Flush> {
        self.visible = visible;
        if visible {
            self.resume();
            None
        } else {
            self.close_stretch();
            self.flush(false, Delivery::Async)
        }
    }

    fn on_teardown(&mut self, kind: Teardown) -> Option<Flush> {
        self.teardown(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::clock::ManualClock;
    use pretty_assertions::assert_eq;

    fn tracker() -> (DocumentTracker<ManualClock>, ManualClock) {
        let clock = ManualClock::new(50_000);
        (DocumentTracker::with_clock("d1", "c1", "u1", clock.clone()), clock)
    }

    fn update(flush: &Flush) -> &DocumentProgressUpdate {
        match &flush.payload {
            FlushPayload::Document { update, .. } => update,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn dwell_time_never_completes() {
        let (mut tracker, clock) = tracker();
        tracker.on_view();
        clock.advance_secs(3_600.0);

        let flush = tracker.on_tick().unwrap();
        assert!(!update(&flush).is_read);
        assert_eq!(update(&flush).reading_time, 3_600.0);
        assert!(!tracker.is_read());
    }

    #[test]
    fn mark_as_read_flushes_with_timestamp() {
        let (mut tracker, clock) = tracker();
        tracker.on_view();
        clock.advance_secs(40.0);

        let flush = tracker.mark_as_read().unwrap();
        let update = update(&flush);
        assert!(update.is_read);
        assert_eq!(update.read_at, Some(90_000));
        assert_eq!(update.reading_time, 40.0);
        assert_eq!(update.course_id, "c1");
        assert_eq!(update.unit_id, "u1");
    }

    #[test]
    fn short_glance_is_discarded() {
        let (mut tracker, clock) = tracker();
        tracker.on_view();
        clock.advance_secs(0.3);

        assert_eq!(tracker.on_teardown(Teardown::Unmount), None);
        assert_eq!(tracker.lifetime_reading_time(), 0.0);
    }

    #[test]
    fn unfocused_time_is_not_counted() {
        let (mut tracker, clock) = tracker();
        tracker.on_view();
        clock.advance_secs(10.0);
        tracker.on_focus_change(false);
        clock.advance_secs(100.0);
        tracker.on_focus_change(true);
        clock.advance_secs(5.0);

        let flush = tracker.on_teardown(Teardown::BeforeUnload).unwrap();
        assert_eq!(update(&flush).reading_time, 15.0);
        assert_eq!(flush.delivery, Delivery::Blocking);
        assert!(flush.is_final);
    }

    #[test]
    fn hidden_flushes_and_stops_counting() {
        let (mut tracker, clock) = tracker();
        tracker.on_view();
        clock.advance_secs(8.0);

        let flush = tracker.on_visibility_change(false).unwrap();
        assert_eq!(update(&flush).reading_time, 8.0);
        assert!(!tracker.is_reading());

        clock.advance_secs(30.0);
        assert_eq!(tracker.on_tick(), None);
    }

    #[test]
    fn repeated_mark_as_read_is_idempotent() {
        let (mut tracker, _clock) = tracker();
        assert!(tracker.mark_as_read().is_some());
        assert_eq!(tracker.mark_as_read(), None);
        assert_eq!(tracker.on_teardown(Teardown::Unmount), None);
    }

    #[test]
    fn failed_flush_is_resent() {
        let (mut tracker, clock) = tracker();
        tracker.on_view();
        clock.advance_secs(20.0);
        let first = tracker.mark_as_read().unwrap();
        tracker.flush_failed(first.sequence);

        let retry = tracker.on_tick().unwrap();
        assert!(update(&retry).is_read);
        assert_eq!(update(&retry).reading_time, 20.0);
        assert!(retry.sequence > first.sequence);
    }

    #[test]
    fn already_read_documents_do_not_resend_flag() {
        let clock = ManualClock::new(0);
        let mut tracker = DocumentTracker::with_clock("d", "c", "u", clock).already_read(true);
        assert!(tracker.is_read());
        assert_eq!(tracker.on_teardown(Teardown::Unmount), None);
    }
}
