//! # Runtime events emitted by the work queue and its workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Work lifecycle**: one work item moving through the queue (enqueued, starting, stopped, failed)
//! - **Queue transitions**: the queue becoming active or idle, abort requests
//! - **Subscriber events**: delivery problems of the fan-out itself
//!
//! The [`Event`] struct carries additional metadata such as timestamps, work
//! name and id, failure reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use migravisor::{Event, EventKind, WorkId};
//!
//! let ev = Event::new(EventKind::WorkFailed)
//!     .with_work(WorkId::from_raw(7), "build-changesets")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::WorkFailed);
//! assert_eq!(ev.work.as_deref(), Some("build-changesets"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::work::WorkId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `work`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `work`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Work lifecycle events ===
    /// Work item appended to the pending sequence.
    ///
    /// Sets:
    /// - `work`, `id`: work name and identity
    WorkEnqueued,

    /// Work item admitted on a slot; its status entry now exists.
    ///
    /// Sets:
    /// - `work`, `id`: work name and identity
    WorkStarting,

    /// Work item returned (successfully or cancelled); its status entry is gone.
    ///
    /// Sets:
    /// - `work`, `id`: work name and identity
    /// - `elapsed_ms`: time spent running
    WorkStopped,

    /// Work item failed; the failure was recorded and the queue keeps going.
    ///
    /// Always followed by `WorkStopped` for the same `id`.
    ///
    /// Sets:
    /// - `work`, `id`: work name and identity
    /// - `reason`: failure message
    WorkFailed,

    // === Queue transitions ===
    /// Active worker count went from 0 to 1.
    QueueActive,

    /// No work is active or pending anymore.
    ///
    /// Sets:
    /// - `elapsed_ms`: cumulative active time at the transition
    QueueIdle,

    /// Abort requested; pending work will not be admitted.
    ///
    /// Sets:
    /// - `reason`: number of dropped pending items
    AbortRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Identity of the work item, if applicable.
    pub id: Option<WorkId>,
    /// Name of the work item (or subscriber), if applicable.
    pub work: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Duration in milliseconds (compact).
    pub elapsed_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            id: None,
            work: None,
            reason: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a work identity and name.
    #[inline]
    pub fn with_work(mut self, id: WorkId, name: impl Into<Arc<str>>) -> Self {
        self.id = Some(id);
        self.work = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"));
        ev.work = Some(subscriber.into());
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.work = Some(subscriber.into());
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panicked(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::QueueActive);
        let b = Event::new(EventKind::QueueIdle);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn elapsed_is_stored_in_millis() {
        let ev = Event::new(EventKind::QueueIdle).with_elapsed(Duration::from_millis(1500));
        assert_eq!(ev.elapsed_ms, Some(1500));
    }

    #[test]
    fn overflow_event_names_the_subscriber() {
        let ev = Event::subscriber_overflow("log", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.work.as_deref(), Some("log"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=log reason=full"));
    }
}
