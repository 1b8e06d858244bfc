//! # Drain-once accumulator for work failures.
//!
//! Workers append, the observer drains. Ordering across concurrently failing
//! items is the order in which they acquired the lock.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::error::WorkError;
use crate::tracking::{QueueListener, lock};
use crate::work::WorkId;

/// One failure raised by a work item.
#[derive(Debug, Clone)]
pub struct WorkFailure {
    /// Identity of the failed run.
    pub id: WorkId,
    /// Name of the failed work item.
    pub work: Arc<str>,
    /// What went wrong.
    pub error: Arc<WorkError>,
    /// When the failure was observed.
    pub at: SystemTime,
}

impl WorkFailure {
    pub(crate) fn new(id: WorkId, work: Arc<str>, error: WorkError) -> Self {
        Self {
            id,
            work,
            error: Arc::new(error),
            at: SystemTime::now(),
        }
    }
}

impl std::fmt::Display for WorkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.work, self.id, self.error)
    }
}

/// Thread-safe, drain-once failure list.
#[derive(Debug, Default)]
pub struct ExceptionSink {
    failures: Mutex<Vec<WorkFailure>>,
}

impl ExceptionSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a failure.
    pub fn record(&self, failure: WorkFailure) {
        lock(&self.failures).push(failure);
    }

    /// Returns every failure recorded since the last drain and clears the list.
    ///
    /// Returns an empty vector if nothing was recorded.
    pub fn drain_all(&self) -> Vec<WorkFailure> {
        std::mem::take(&mut *lock(&self.failures))
    }

    /// Number of failures waiting to be drained.
    pub fn len(&self) -> usize {
        lock(&self.failures).len()
    }

    /// Returns `true` if nothing is waiting to be drained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueueListener for ExceptionSink {
    fn on_exception(&self, failure: &WorkFailure) {
        self.record(failure.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_everything_once() {
        let sink = ExceptionSink::new();
        sink.on_exception(&WorkFailure::new(
            WorkId::from_raw(1),
            "e1".into(),
            WorkError::fail("first"),
        ));
        sink.on_exception(&WorkFailure::new(
            WorkId::from_raw(2),
            "e2".into(),
            WorkError::fatal("second"),
        ));
        assert_eq!(sink.len(), 2);

        let drained = sink.drain_all();
        let names: Vec<&str> = drained.iter().map(|f| &*f.work).collect();
        assert_eq!(names, vec!["e1", "e2"]);

        assert!(sink.drain_all().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn failure_renders_name_id_and_error() {
        let f = WorkFailure::new(WorkId::from_raw(9), "export".into(), WorkError::fail("disk"));
        assert_eq!(f.to_string(), "export #9: execution failed: disk");
    }
}
