//! Delivery of tracker flushes
//!
//! [`ProgressSync`] sends each flush over the path it asks for, records it
//! in the local [`ProgressCache`] and reports the outcome back to the
//! tracker that produced it. Transient failures never interrupt playback:
//! the data is handed back to the tracker and goes out with the next natural
//! flush. Writes the backend refuses as malformed are dropped.

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use super::event::{Delivery, Flush, FlushSource, PlayerEvent};
use super::tracker::WatchSessionTracker;
use crate::api::{ApiError, ProgressTransport};
use crate::config::{CachedProgress, ProgressCache};

/// What happened to a flush
#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered,
    /// Failed transiently; the data stays with the tracker for the next flush
    Retrying(ApiError),
    /// The flush can never succeed (a final flush, or a malformed write); its
    /// data is discarded
    Dropped(ApiError),
    /// The backend refused the write in a way the caller must handle
    /// (authentication or a progression conflict)
    Rejected(ApiError),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Delivered => None,
            Self::Retrying(e) | Self::Dropped(e) | Self::Rejected(e) => Some(e),
        }
    }
}

/// Sends flushes and keeps the local replica current
pub struct ProgressSync<T> {
    transport: T,
    cache: ProgressCache,
}

impl<T: ProgressTransport + Sync> ProgressSync<T> {
    pub fn new(transport: T, cache: ProgressCache) -> Self {
        Self { transport, cache }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> &ProgressCache {
        &self.cache
    }

    pub fn into_cache(self) -> ProgressCache {
        self.cache
    }

    /// Deliver one flush, wait for the answer and report it to `source`
    pub async fn dispatch<S: FlushSource>(
        &mut self,
        source: &mut S,
        flush: Flush,
    ) -> DispatchOutcome {
        self.cache.apply(&flush);

        let result = match flush.delivery {
            Delivery::Async => self.transport.send(&flush.payload).await,
            Delivery::Blocking => self.transport.send_blocking(&flush.payload),
        };

        settle(&mut self.cache, source, &flush, result)
    }

    /// Resend cached updates the backend never confirmed, such as those left
    /// by a page that closed mid-request. Returns how many were delivered.
    pub async fn resend_unacknowledged(&mut self) -> usize {
        let pending: Vec<CachedProgress> = self.cache.unacknowledged().cloned().collect();
        let mut delivered = 0;

        for entry in pending {
            let content_id = entry.payload.content_id();
            match self.transport.send(&entry.payload).await {
                Ok(()) => {
                    self.cache.acknowledge(content_id, entry.sequence, entry.timestamp);
                    delivered += 1;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(content = content_id, error = %e, "cached update still unsent");
                }
                Err(e) => {
                    // Never deliverable; stop offering it
                    self.cache.acknowledge(content_id, entry.sequence, entry.timestamp);
                    tracing::warn!(content = content_id, error = %e, "cached update refused");
                }
            }
        }

        if delivered > 0 {
            tracing::info!(delivered, "resent cached progress");
        }
        delivered
    }
}

/// Record the result of a delivered or failed flush
fn settle<S: FlushSource>(
    cache: &mut ProgressCache,
    source: &mut S,
    flush: &Flush,
    result: Result<(), ApiError>,
) -> DispatchOutcome {
    let content_id = flush.payload.content_id();
    let error = match result {
        Ok(()) => {
            source.acknowledge(flush.sequence);
            cache.acknowledge(content_id, flush.sequence, flush.payload.timestamp());
            tracing::debug!(content = content_id, sequence = flush.sequence, "flush delivered");
            return DispatchOutcome::Delivered;
        }
        Err(e) => e,
    };

    if error.requires_reauth() || error.is_progression_conflict() {
        source.flush_failed(flush.sequence);
        tracing::warn!(content = content_id, error = %error, "progress write rejected");
        DispatchOutcome::Rejected(error)
    } else if flush.is_final {
        source.flush_dropped(flush.sequence);
        tracing::warn!(content = content_id, error = %error, "final flush failed, dropping");
        DispatchOutcome::Dropped(error)
    } else if !error.is_recoverable() {
        source.flush_dropped(flush.sequence);
        tracing::warn!(content = content_id, error = %error, "flush refused by backend, dropping");
        DispatchOutcome::Dropped(error)
    } else {
        source.flush_failed(flush.sequence);
        tracing::warn!(
            content = content_id,
            error = %error,
            "flush failed, retrying at next flush point"
        );
        DispatchOutcome::Retrying(error)
    }
}

/// An async send in progress, carrying its flush along for settling
type InFlight<'a> = BoxFuture<'a, (Flush, Result<(), ApiError>)>;

fn deliver<T: ProgressTransport + Sync>(transport: &T, flush: Flush) -> InFlight<'_> {
    async move {
        let result = transport.send(&flush.payload).await;
        (flush, result)
    }
    .boxed()
}

/// Drive a tracker from a channel of player events.
///
/// Events and ticks are handled one at a time, so the tracker state is never
/// modified concurrently. Async flushes are sent in the background and their
/// outcomes are folded back in as they arrive; a slow request never holds up
/// the next event.
///
/// The loop ends when `cancel` fires or the sender is dropped. On cancel the
/// page is closing: events already queued are applied first, then the
/// remaining state goes out in one blocking flush and requests still in
/// flight are abandoned. A dropped sender means the player unmounted while
/// the page lives on, so the final flush is async and every outstanding
/// request is awaited. Returns the tracker for inspection.
pub async fn run_tracker<C, T>(
    mut tracker: WatchSessionTracker<C>,
    sync: &mut ProgressSync<T>,
    mut events: mpsc::Receiver<PlayerEvent>,
    period: Duration,
    cancel: CancellationToken,
) -> WatchSessionTracker<C>
where
    C: Clock,
    T: ProgressTransport + Sync,
{
    let ProgressSync { transport, cache } = sync;
    let transport = &*transport;
    let mut in_flight: FuturesUnordered<InFlight<'_>> = FuturesUnordered::new();

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let flush = tokio::select! {
            biased;

            Some((flush, result)) = in_flight.next(), if !in_flight.is_empty() => {
                settle(cache, &mut tracker, &flush, result);
                continue;
            }

            _ = cancel.cancelled() => {
                while let Ok(event) = events.try_recv() {
                    // Folded into the closing flush below
                    if let Some(flush) = tracker.handle(event) {
                        tracker.flush_failed(flush.sequence);
                    }
                }

                if let Some(flush) = tracker.on_before_unload() {
                    cache.apply(&flush);
                    let result = transport.send_blocking(&flush.payload);
                    settle(cache, &mut tracker, &flush, result);
                }
                if !in_flight.is_empty() {
                    tracing::debug!(
                        video = tracker.video_id(),
                        count = in_flight.len(),
                        "page closing, abandoning async flushes"
                    );
                }
                break;
            }

            event = events.recv() => match event {
                Some(event) => tracker.handle(event),
                None => {
                    if let Some(flush) = tracker.on_unmount() {
                        cache.apply(&flush);
                        in_flight.push(deliver(transport, flush));
                    }
                    while let Some((flush, result)) = in_flight.next().await {
                        settle(cache, &mut tracker, &flush, result);
                    }
                    break;
                }
            },

            _ = ticker.tick() => {
                let position = tracker.position();
                tracker.on_tick(position)
            }
        };

        let Some(flush) = flush else {
            continue;
        };

        cache.apply(&flush);
        match flush.delivery {
            Delivery::Async => in_flight.push(deliver(transport, flush)),
            Delivery::Blocking => {
                let result = transport.send_blocking(&flush.payload);
                settle(cache, &mut tracker, &flush, result);
            }
        }
    }

    tracker
}
