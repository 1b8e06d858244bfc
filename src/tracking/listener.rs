//! # Queue lifecycle hooks.

use crate::tracking::WorkFailure;
use crate::work::WorkId;

/// Observer of the work queue's lifecycle.
///
/// Hooks run synchronously on the thread driving the transition and must
/// return quickly; they must not call back into the queue.
///
/// ### Ordering
/// - `on_active` fires when the active count goes 0 → 1, before that item's `on_start`.
/// - For one item: `on_start` → (`on_exception`) → `on_stop`.
/// - `on_idle` fires after the last `on_stop`, once nothing is pending.
/// - `on_active`/`on_idle` are serialized with the queue state, so they
///   strictly alternate.
pub trait QueueListener: Send + Sync + 'static {
    /// The queue went from idle to having an active worker.
    fn on_active(&self) {}

    /// No work is active and nothing is pending.
    fn on_idle(&self) {}

    /// An item was admitted and is about to run.
    fn on_start(&self, _id: WorkId, _name: &str) {}

    /// An item finished (normally or not).
    fn on_stop(&self, _id: WorkId, _name: &str) {}

    /// An item returned an error or panicked.
    fn on_exception(&self, _failure: &WorkFailure) {}
}
