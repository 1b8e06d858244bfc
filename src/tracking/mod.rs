//! # Queue listeners and the observer-facing registries.
//!
//! The work queue exposes four lifecycle extension points through
//! [`QueueListener`]. The registries in this module are listeners that turn
//! those hooks into state an observer can poll without ever touching the
//! queue's internals:
//!
//! ```text
//!  WorkQueue ──on_start/on_stop────────► StatusRegistry  (per-item status + headline)
//!            ──on_exception────────────► ExceptionSink   (drain-once failure list)
//!            ──on_active/on_idle───────► IdleGate        (wait, idle edge, active time)
//!            ──any hook────────────────► user listeners
//! ```
//!
//! Each registry guards its state with its own mutex; they are never locked
//! together, so no cross-structure lock order exists.

mod exceptions;
mod idle;
mod listener;
mod status;

pub use exceptions::{ExceptionSink, WorkFailure};
pub use idle::{GateState, IdleGate};
pub use listener::QueueListener;
pub use status::StatusRegistry;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a registry mutex, recovering the data if a holder panicked.
///
/// Registries only hold plain data that stays consistent between statements.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
