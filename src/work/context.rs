//! # Per-run work context.
//!
//! [`WorkContext`] is handed to every [`Work::spawn`](crate::Work::spawn). It
//! carries the item's identity, the queue's abort token and a handle to the
//! [`StatusRegistry`] so the item can publish a human-readable status.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::tracking::StatusRegistry;
use crate::work::WorkId;

/// Handle given to a running work item.
///
/// Cheap to clone; clones may be moved into blocking threads.
#[derive(Clone)]
pub struct WorkContext {
    id: WorkId,
    name: Arc<str>,
    abort: CancellationToken,
    status: Arc<StatusRegistry>,
}

impl WorkContext {
    pub(crate) fn new(
        id: WorkId,
        name: Arc<str>,
        abort: CancellationToken,
        status: Arc<StatusRegistry>,
    ) -> Self {
        Self {
            id,
            name,
            abort,
            status,
        }
    }

    /// Identity of this run.
    pub fn id(&self) -> WorkId {
        self.id
    }

    /// Name of the work item.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the queue was aborted.
    ///
    /// Poll this between units of work; running items are never interrupted.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Completes when the queue is aborted (for use in `tokio::select!`).
    pub async fn aborted(&self) {
        self.abort.cancelled().await
    }

    /// Sets this item's status text; an empty string clears it.
    pub fn set_status(&self, text: impl Into<String>) {
        self.status.set_status(self.id, Some(text.into()));
    }

    /// Clears this item's status text.
    pub fn clear_status(&self) {
        self.status.set_status(self.id, None);
    }

    /// Returns this item's current status text.
    pub fn status(&self) -> Option<String> {
        self.status.get_status(self.id)
    }
}
