//! Watch-time tracking for a single video
//!
//! The tracker turns raw player events into watch sessions, folds them into a
//! [`CumulativeWatchState`] and produces [`Flush`] requests. Every handler
//! runs to completion before the next event is seen, so the read-modify-write
//! of the state between an event and its flush is never interleaved.
//!
//! Flushes are idempotent from the backend's point of view:
//! - a closed session is counted exactly once, because closing consumes it;
//! - time handed to a flush is held "in flight" until acknowledged, and is
//!   returned to the unflushed total only if that flush fails;
//! - a flush that would repeat the last one is not produced at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock, elapsed_secs};
use super::completion::{CompletionInput, is_completed};
use super::event::{
    Delivery, Flush, FlushPayload, FlushSource, PlayerEvent, SessionObserver, Teardown,
};
use super::segments::SegmentSet;
use super::session::{MIN_SESSION_SECONDS, OpenSession, WatchSession};
use crate::api::{ResumePosition, WatchUpdate};
use crate::content::ContentId;

/// Forward movement allowed beyond the furthest position reached (seconds)
pub const SEEK_TOLERANCE_SECONDS: f64 = 1.0;
/// Playback rates outside `(0, MAX_PLAYBACK_RATE]` are ignored
pub const MAX_PLAYBACK_RATE: f64 = 16.0;

/// Accumulated watch data for one video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeWatchState {
    /// Speed-adjusted seconds not yet handed to a flush
    pub total_watch_time_seconds: f64,
    /// Speed-adjusted seconds over the tracker's lifetime; never reset
    pub lifetime_watch_time_seconds: f64,
    /// Watched 5-second buckets; never reset
    pub segments: SegmentSet,
    pub last_known_position: f64,
    pub furthest_position: f64,
    /// The player fired its natural `ended` event
    pub ended: bool,
}

impl CumulativeWatchState {
    /// Seconds covered by watched segments, capped at the duration
    pub fn cumulative_segment_time(&self, duration: f64) -> f64 {
        self.segments.covered_seconds(duration)
    }
}

/// Result of a position change request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionCheck {
    Accepted(f64),
    /// The player must be moved back to `reset_to`
    Rejected { reset_to: f64 },
}

/// What the last issued flush reported
#[derive(Debug, Clone, Copy, PartialEq)]
struct Snapshot {
    position: f64,
    completed: bool,
    segments: usize,
}

impl Snapshot {
    fn differs_from(&self, other: &Snapshot) -> bool {
        self.completed != other.completed
            || self.segments != other.segments
            || (self.position - other.position).abs() >= SEEK_TOLERANCE_SECONDS
    }
}

/// Tracks playback of one video and produces progress flushes
#[derive(Debug)]
pub struct WatchSessionTracker<C: Clock = SystemClock> {
    video_id: ContentId,
    duration: f64,
    clock: C,
    state: CumulativeWatchState,
    open: Option<OpenSession>,
    playback_rate: f64,
    playing: bool,
    hidden: bool,
    /// When the position was last accepted (ms)
    last_update_at: i64,
    next_sequence: u64,
    in_flight: BTreeMap<u64, f64>,
    last_issued: Option<Snapshot>,
    sessions: Vec<WatchSession>,
}

impl WatchSessionTracker<SystemClock> {
    /// Track a video against the system clock
    pub fn new(video_id: impl Into<ContentId>, duration: f64) -> Self {
        Self::with_clock(video_id, duration, SystemClock)
    }
}

impl<C: Clock> WatchSessionTracker<C> {
    pub fn with_clock(video_id: impl Into<ContentId>, duration: f64, clock: C) -> Self {
        let video_id = video_id.into();
        let duration = if duration.is_finite() && duration >= 0.0 {
            duration
        } else {
            tracing::warn!(
                video = %video_id,
                duration,
                "invalid video duration, completion disabled"
            );
            0.0
        };
        let now = clock.now_ms();

        Self {
            video_id,
            duration,
            clock,
            state: CumulativeWatchState::default(),
            open: None,
            playback_rate: 1.0,
            playing: false,
            hidden: false,
            last_update_at: now,
            next_sequence: 1,
            in_flight: BTreeMap::new(),
            last_issued: Some(Snapshot { position: 0.0, completed: false, segments: 0 }),
            sessions: Vec::new(),
        }
    }

    /// Start from the position the backend saved for this video
    pub fn with_resume(mut self, resume: &ResumePosition) -> Self {
        if self.duration == 0.0 && resume.video_duration.is_finite() && resume.video_duration > 0.0
        {
            self.duration = resume.video_duration;
        }

        if resume.has_resume_position
            && resume.current_position.is_finite()
            && resume.current_position >= 0.0
        {
            self.accept_position(resume.current_position);
            self.last_issued = Some(self.snapshot(false));
        }

        self
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Last accepted playback position
    pub fn position(&self) -> f64 {
        self.state.last_known_position
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn state(&self) -> &CumulativeWatchState {
        &self.state
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn open_session(&self) -> Option<&OpenSession> {
        self.open.as_ref()
    }

    /// Closed sessions, oldest first
    pub fn sessions(&self) -> &[WatchSession] {
        &self.sessions
    }

    /// Time not yet acknowledged by the backend, including in-flight flushes
    pub fn pending_time(&self) -> f64 {
        self.state.total_watch_time_seconds + self.in_flight.values().sum::<f64>()
    }

    /// Route a player event to its handler
    pub fn handle(&mut self, event: PlayerEvent) -> Option<Flush> {
        match event {
            PlayerEvent::Play { position } => self.on_play(position),
            PlayerEvent::Pause { position } => self.on_pause(position),
            PlayerEvent::TimeUpdate { position } => {
                self.on_time_update(position);
                None
            }
            PlayerEvent::Seek { position } => {
                self.on_seek(position);
                None
            }
            PlayerEvent::RateChange { rate } => self.on_rate_change(rate),
            PlayerEvent::Ended => self.on_ended(),
            PlayerEvent::VisibilityHidden => self.on_visibility_hidden(),
            PlayerEvent::VisibilityVisible => self.on_visibility_visible(),
            PlayerEvent::Tick { position } => self.on_tick(position),
            PlayerEvent::Unmount => self.on_unmount(),
            PlayerEvent::BeforeUnload => self.on_before_unload(),
        }
    }

    pub fn on_play(&mut self, position: f64) -> Option<Flush> {
        self.check_seek(position);

        if self.open.is_none() {
            self.playing = true;
            if !self.hidden {
                self.start_session();
            }
        }

        None
    }

    pub fn on_pause(&mut self, position: f64) -> Option<Flush> {
        self.on_time_update(position);
        self.playing = false;
        self.close_session();
        self.flush(false, Delivery::Async)
    }

    /// Natural playback progress. The position may advance by the elapsed
    /// time at the current rate, plus the seek tolerance.
    pub fn on_time_update(&mut self, position: f64) -> PositionCheck {
        let now = self.clock.now_ms();
        let natural = if self.open.is_some() {
            elapsed_secs(self.last_update_at, now) * self.playback_rate
        } else {
            0.0
        };

        match self.guard(position, natural) {
            PositionCheck::Accepted(position) => {
                self.accept_position(position);
                self.last_update_at = now;
                PositionCheck::Accepted(position)
            }
            rejected => rejected,
        }
    }

    /// User-initiated seek. Rewinding is always allowed; jumping forward past
    /// the furthest position reached is not.
    pub fn on_seek(&mut self, target: f64) -> PositionCheck {
        let check = self.guard(target, 0.0);

        if let PositionCheck::Accepted(target) = check {
            if self.open.is_some() {
                self.close_session();
                self.accept_position(target);
                self.start_session();
            } else {
                self.accept_position(target);
                self.last_update_at = self.clock.now_ms();
            }
        }

        check
    }

    pub fn on_rate_change(&mut self, rate: f64) -> Option<Flush> {
        if !rate.is_finite() || rate <= 0.0 || rate > MAX_PLAYBACK_RATE {
            tracing::debug!(video = %self.video_id, rate, "ignoring invalid playback rate");
            return None;
        }

        if self.open.is_some() {
            self.close_session();
            self.playback_rate = rate;
            self.start_session();
        } else {
            self.playback_rate = rate;
        }

        None
    }

    pub fn on_ended(&mut self) -> Option<Flush> {
        let reached_end = self.duration == 0.0
            || matches!(self.on_time_update(self.duration), PositionCheck::Accepted(_));
        if reached_end {
            self.state.ended = true;
        } else {
            tracing::debug!(video = %self.video_id, "ended fired away from the end, ignoring");
        }

        self.playing = false;
        self.close_session();
        self.flush(false, Delivery::Async)
    }

    pub fn on_visibility_hidden(&mut self) -> Option<Flush> {
        self.hidden = true;
        self.close_session();
        self.flush(false, Delivery::Async)
    }

    /// Resume counting at the last known position. Background playback while
    /// hidden is not credited.
    pub fn on_visibility_visible(&mut self) -> Option<Flush> {
        self.hidden = false;
        if self.playing && self.open.is_none() {
            self.start_session();
        }
        None
    }

    /// Periodic checkpoint: close the running session, reopen it at the
    /// current position and flush what was gathered.
    pub fn on_tick(&mut self, position: f64) -> Option<Flush> {
        if self.open.is_some() {
            self.on_time_update(position);
            self.checkpoint();
        }
        self.flush(false, Delivery::Async)
    }

    pub fn on_unmount(&mut self) -> Option<Flush> {
        self.teardown(Teardown::Unmount)
    }

    pub fn on_before_unload(&mut self) -> Option<Flush> {
        self.teardown(Teardown::BeforeUnload)
    }

    /// Checkpoint and flush immediately
    pub fn flush_now(&mut self) -> Option<Flush> {
        self.checkpoint();
        self.flush(false, Delivery::Async)
    }

    fn teardown(&mut self, kind: Teardown) -> Option<Flush> {
        self.playing = false;
        self.close_session();
        self.flush(true, kind.delivery())
    }

    fn guard(&self, position: f64, natural_advance: f64) -> PositionCheck {
        let reset_to = self.state.last_known_position;
        if !position.is_finite() || position < 0.0 {
            return PositionCheck::Rejected { reset_to };
        }

        let limit = self.state.last_known_position.max(self.state.furthest_position)
            + SEEK_TOLERANCE_SECONDS
            + natural_advance;

        if position > limit {
            tracing::debug!(
                video = %self.video_id,
                position,
                limit,
                "rejecting forward seek, resetting to last known position"
            );
            PositionCheck::Rejected { reset_to }
        } else {
            PositionCheck::Accepted(position)
        }
    }

    fn check_seek(&mut self, position: f64) {
        if let PositionCheck::Accepted(position) = self.guard(position, 0.0) {
            self.accept_position(position);
        }
    }

    fn accept_position(&mut self, position: f64) {
        let position = if self.duration > 0.0 { position.min(self.duration) } else { position };
        self.state.last_known_position = position;
        self.state.furthest_position = self.state.furthest_position.max(position);
    }

    fn start_session(&mut self) {
        let now = self.clock.now_ms();
        self.open = Some(OpenSession::new(
            self.video_id.clone(),
            now,
            self.state.last_known_position,
            self.playback_rate,
        ));
        self.last_update_at = now;
    }

    /// Close the open session; returns whether it was long enough to count
    fn close_session(&mut self) -> bool {
        let Some(open) = self.open.take() else {
            return false;
        };

        let now = self.clock.now_ms();
        let Some(session) = open.close(now, self.state.last_known_position, self.duration) else {
            tracing::debug!(video = %self.video_id, "discarding session shorter than threshold");
            return false;
        };

        let adjusted = session.adjusted_time();
        self.state.total_watch_time_seconds += adjusted;
        self.state.lifetime_watch_time_seconds += adjusted;
        self.state.segments.extend(session.segments_touched.iter().copied());
        self.sessions.push(session);
        true
    }

    /// Close and reopen the running session so its time can be flushed
    fn checkpoint(&mut self) {
        let now = self.clock.now_ms();
        let due = self.open.as_ref().is_some_and(|open| open.elapsed(now) >= MIN_SESSION_SECONDS);
        if due {
            self.close_session();
            if self.playing && !self.hidden {
                self.start_session();
            }
        }
    }

    fn is_completed(&self, is_final: bool) -> bool {
        is_completed(&CompletionInput {
            duration: self.duration,
            position: self.state.furthest_position,
            reported_time: self.state.lifetime_watch_time_seconds,
            segment_time: self.state.cumulative_segment_time(self.duration),
            is_final,
            ended: self.state.ended,
        })
    }

    fn snapshot(&self, is_final: bool) -> Snapshot {
        Snapshot {
            position: self.state.last_known_position,
            completed: self.is_completed(is_final),
            segments: self.state.segments.len(),
        }
    }

    /// Build a flush from the current state, or `None` if it would only
    /// repeat the last one.
    pub fn flush(&mut self, is_final: bool, delivery: Delivery) -> Option<Flush> {
        let snapshot = self.snapshot(is_final);
        let time_spent = self.state.total_watch_time_seconds;

        let unchanged = self.last_issued.is_some_and(|last| !snapshot.differs_from(&last));
        if time_spent <= 0.0 && unchanged {
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.state.total_watch_time_seconds = 0.0;
        self.in_flight.insert(sequence, time_spent);
        self.last_issued = Some(snapshot);

        let update = WatchUpdate {
            time_spent,
            current_time: self.state.last_known_position,
            duration: self.duration,
            playback_rate: self.playback_rate,
            is_completed: snapshot.completed,
            segments_watched: self.state.segments.len() as u32,
            total_segments: SegmentSet::total_segments(self.duration),
            is_final,
            timestamp: self.clock.now_ms(),
        };

        Some(Flush {
            sequence,
            delivery,
            is_final,
            payload: FlushPayload::Video { video_id: self.video_id.clone(), update },
        })
    }
}

impl<C: Clock> FlushSource for WatchSessionTracker<C> {
    fn acknowledge(&mut self, sequence: u64) {
        self.in_flight.remove(&sequence);
    }

    fn flush_failed(&mut self, sequence: u64) {
        if let Some(time) = self.in_flight.remove(&sequence) {
            self.state.total_watch_time_seconds += time;
        }
        self.last_issued = None;
    }

    fn flush_dropped(&mut self, sequence: u64) {
        if let Some(time) = self.in_flight.remove(&sequence) {
            tracing::debug!(video = %self.video_id, sequence, time, "discarding undelivered time");
        }
    }
}

impl<C: Clock> SessionObserver for WatchSessionTracker<C> {
    /// Video keeps playing without focus
    fn on_focus_change(&mut self, _focused: bool) -> Option<Flush> {
        None
    }

    fn on_visibility_change(&mut self, visible: bool) -> Option<Flush> {
        if visible { self.on_visibility_visible() } else { self.on_visibility_hidden() }
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

    fn tracker(duration: f64) -> (WatchSessionTracker<ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        (WatchSessionTracker::with_clock("v1", duration, clock.clone()), clock)
    }

    fn update(flush: &Flush) -> &WatchUpdate {
        match &flush.payload {
            FlushPayload::Video { update, .. } => update,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    /// Play from the current position for `secs` at the current rate,
    /// reporting time updates every second
    fn play_for(tracker: &mut WatchSessionTracker<ManualClock>, clock: &ManualClock, secs: u32) {
        for _ in 0..secs {
            clock.advance_secs(1.0);
            let next = tracker.position() + tracker.playback_rate();
            tracker.on_time_update(next);
        }
    }

    #[test]
    fn speed_abuse_is_capped() {
        let (mut tracker, clock) = tracker(60.0);
        tracker.on_rate_change(4.0);
        tracker.on_play(0.0);
        clock.advance_secs(10.0);

        let flush = tracker.on_pause(2.0).unwrap();
        assert_eq!(update(&flush).time_spent, 6.0);
        assert_eq!(update(&flush).playback_rate, 4.0);
    }

    #[test]
    fn sub_threshold_session_leaves_no_trace() {
        let (mut tracker, clock) = tracker(60.0);
        tracker.on_play(0.0);
        clock.advance_secs(0.3);

        assert_eq!(tracker.on_pause(0.3), None);
        assert!(tracker.sessions().is_empty());
        assert_eq!(tracker.state().total_watch_time_seconds, 0.0);
        assert!(tracker.state().segments.is_empty());
    }

    #[test]
    fn forward_seek_is_rejected_and_rewind_allowed() {
        let (tracker, _clock) = tracker(120.0);
        let resume = ResumePosition {
            has_resume_position: true,
            current_position: 30.0,
            ..Default::default()
        };
        let mut tracker = tracker.with_resume(&resume);

        assert_eq!(tracker.on_seek(50.0), PositionCheck::Rejected { reset_to: 30.0 });
        assert_eq!(tracker.position(), 30.0);

        assert_eq!(tracker.on_seek(10.0), PositionCheck::Accepted(10.0));
        assert_eq!(tracker.position(), 10.0);

        // Returning to where the student already was is fine
        assert_eq!(tracker.on_seek(30.5), PositionCheck::Accepted(30.5));
    }

    #[test]
    fn rewound_student_may_skip_back_to_furthest_point() {
        let (mut tracker, clock) = tracker(120.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 60);
        assert_eq!(tracker.state().furthest_position, 60.0);

        assert_eq!(tracker.on_seek(10.0), PositionCheck::Accepted(10.0));
        play_for(&mut tracker, &clock, 5);
        assert_eq!(tracker.position(), 15.0);

        // The limit is measured from the furthest point, not the rewound one
        assert_eq!(tracker.on_seek(60.9), PositionCheck::Accepted(60.9));
        assert_eq!(tracker.on_seek(15.0), PositionCheck::Accepted(15.0));
        assert_eq!(tracker.on_seek(62.5), PositionCheck::Rejected { reset_to: 15.0 });
        assert_eq!(tracker.position(), 15.0);
        assert_eq!(tracker.state().furthest_position, 60.9);
    }

    #[test]
    fn unknown_duration_with_far_resume_marks_no_segments() {
        let (tracker, clock) = tracker(0.0);
        let resume = ResumePosition {
            has_resume_position: true,
            current_position: 4.0e12,
            ..Default::default()
        };
        let mut tracker = tracker.with_resume(&resume);
        tracker.on_play(4.0e12);
        clock.advance_secs(2.0);
        assert_eq!(tracker.on_time_update(1.0), PositionCheck::Accepted(1.0));

        let flush = tracker.on_pause(1.0).unwrap();
        assert!(tracker.state().segments.is_empty());
        assert_eq!(update(&flush).segments_watched, 0);
    }

    #[test]
    fn time_update_cannot_outrun_playback() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        clock.advance_secs(2.0);

        assert_eq!(tracker.on_time_update(2.0), PositionCheck::Accepted(2.0));
        clock.advance_secs(1.0);
        assert_eq!(tracker.on_time_update(200.0), PositionCheck::Rejected { reset_to: 2.0 });
    }

    #[test]
    fn seek_while_playing_splits_session() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 20);
        tracker.on_seek(5.0);
        play_for(&mut tracker, &clock, 5);
        tracker.on_pause(10.0);

        let sessions = tracker.sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].end_position, 20.0);
        assert_eq!(sessions[1].start_position, 5.0);
        // Rewatched buckets are not counted twice
        assert_eq!(tracker.state().segments.len(), 4);
    }

    #[test]
    fn pause_then_unmount_flushes_once() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 20);

        let flush = tracker.on_pause(20.0).unwrap();
        assert_eq!(update(&flush).time_spent, 20.0);
        assert_eq!(tracker.on_unmount(), None);
        assert_eq!(tracker.on_before_unload(), None);

        tracker.acknowledge(flush.sequence);
        assert_eq!(tracker.pending_time(), 0.0);
    }

    #[test]
    fn failed_flush_is_retried_at_next_flush_point() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 10);
        let first = tracker.on_pause(10.0).unwrap();
        tracker.flush_failed(first.sequence);

        tracker.on_play(10.0);
        play_for(&mut tracker, &clock, 5);
        let second = tracker.on_pause(15.0).unwrap();

        assert_eq!(update(&second).time_spent, 15.0);
        assert!(second.sequence > first.sequence);
    }

    #[test]
    fn in_flight_time_is_not_sent_twice() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 10);
        let first = tracker.on_pause(10.0).unwrap();

        tracker.on_play(10.0);
        play_for(&mut tracker, &clock, 5);
        let second = tracker.on_pause(15.0).unwrap();

        assert_eq!(update(&first).time_spent, 10.0);
        assert_eq!(update(&second).time_spent, 5.0);
        assert_eq!(tracker.pending_time(), 15.0);

        tracker.acknowledge(second.sequence);
        tracker.acknowledge(first.sequence);
        assert_eq!(tracker.pending_time(), 0.0);
    }

    #[test]
    fn watching_to_the_end_completes() {
        let (mut tracker, clock) = tracker(120.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 119);

        let flush = tracker.on_pause(119.0).unwrap();
        assert!(update(&flush).is_completed);
        assert_eq!(update(&flush).segments_watched, 24);
        assert_eq!(update(&flush).total_segments, 24);
    }

    #[test]
    fn ended_forces_completion_on_final_flush() {
        let (tracker, clock) = tracker(120.0);
        let resume = ResumePosition {
            has_resume_position: true,
            current_position: 100.0,
            ..Default::default()
        };
        let mut tracker = tracker.with_resume(&resume);

        tracker.on_play(100.0);
        clock.advance_secs(20.0);
        let ended = tracker.on_ended().unwrap();
        assert!(!update(&ended).is_completed);
        assert!(!ended.is_final);

        let last = tracker.on_before_unload().unwrap();
        assert!(last.is_final);
        assert_eq!(last.delivery, Delivery::Blocking);
        assert!(update(&last).is_completed);
        assert_eq!(update(&last).time_spent, 0.0);
    }

    #[test]
    fn tick_checkpoints_running_session() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 15);

        let first = tracker.on_tick(15.0).unwrap();
        assert_eq!(update(&first).time_spent, 15.0);
        assert!(tracker.open_session().is_some());

        play_for(&mut tracker, &clock, 15);
        let second = tracker.on_tick(30.0).unwrap();
        assert_eq!(update(&second).time_spent, 15.0);
        assert_eq!(update(&second).current_time, 30.0);
    }

    #[test]
    fn hidden_time_is_not_counted() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 10);

        let hidden = tracker.on_visibility_hidden().unwrap();
        assert_eq!(update(&hidden).time_spent, 10.0);
        assert!(tracker.open_session().is_none());

        clock.advance_secs(60.0);
        tracker.on_visibility_visible();
        assert_eq!(tracker.open_session().map(|s| s.start_position), Some(10.0));

        play_for(&mut tracker, &clock, 5);
        let flush = tracker.on_pause(15.0).unwrap();
        assert_eq!(update(&flush).time_spent, 5.0);
    }

    #[test]
    fn unmount_is_final_but_async() {
        let (mut tracker, clock) = tracker(600.0);
        tracker.on_play(0.0);
        play_for(&mut tracker, &clock, 5);

        let flush = tracker.on_unmount().unwrap();
        assert!(flush.is_final);
        assert_eq!(flush.delivery, Delivery::Async);
        assert!(!tracker.is_playing());
    }

    #[test]
    fn sequences_and_timestamps_increase() {
        let (mut tracker, clock) = tracker(600.0);
        let mut last = (0, 0);

        for _ in 0..3 {
            tracker.on_play(tracker.position());
            play_for(&mut tracker, &clock, 5);
            let flush = tracker.on_pause(tracker.position()).unwrap();
            let current = (flush.sequence, update(&flush).timestamp);
            assert!(current > last);
            last = current;
        }
    }

    #[test]
    fn invalid_rate_is_ignored() {
        let (mut tracker, _clock) = tracker(60.0);
        tracker.on_rate_change(0.0);
        tracker.on_rate_change(f64::NAN);
        tracker.on_rate_change(100.0);
        assert_eq!(tracker.playback_rate(), 1.0);
    }

    #[test]
    fn handle_routes_events() {
        let (mut tracker, clock) = tracker(60.0);
        assert_eq!(tracker.handle(PlayerEvent::Play { position: 0.0 }), None);
        clock.advance_secs(4.0);
        tracker.handle(PlayerEvent::TimeUpdate { position: 4.0 });

        let flush = tracker.handle(PlayerEvent::Pause { position: 4.0 }).unwrap();
        assert_eq!(update(&flush).time_spent, 4.0);
        assert_eq!(update(&flush).current_time, 4.0);
    }

    #[test]
    fn invalid_duration_disables_completion() {
        let (mut tracker, clock) = {
            let clock = ManualClock::new(0);
            (WatchSessionTracker::with_clock("v", -5.0, clock.clone()), clock)
        };
        tracker.on_play(0.0);
        clock.advance_secs(3.0);
        let flush = tracker.on_pause(3.0).unwrap();
        assert_eq!(tracker.duration(), 0.0);
        assert!(!update(&flush).is_completed);
    }
}
