//! # LogWriter: tracing-backed event printer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO [enqueued] work="scan-revisions" id=1
//! INFO [starting] work="scan-revisions" id=1
//! WARN [failed] work="build-changesets" id=2 err="execution failed: bad history"
//! INFO [stopped] work="scan-revisions" id=1 elapsed_ms=120
//! INFO [active]
//! INFO [idle] active_ms=480
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let work = e.work.as_deref().unwrap_or("<unknown>");
        let id = e.id.map(|id| id.as_u64()).unwrap_or_default();
        match e.kind {
            EventKind::WorkEnqueued => info!("[enqueued] work={work:?} id={id}"),
            EventKind::WorkStarting => info!("[starting] work={work:?} id={id}"),
            EventKind::WorkStopped => info!(
                "[stopped] work={work:?} id={id} elapsed_ms={}",
                e.elapsed_ms.unwrap_or_default()
            ),
            EventKind::WorkFailed => warn!(
                "[failed] work={work:?} id={id} err={:?}",
                e.reason.as_deref().unwrap_or("")
            ),
            EventKind::QueueActive => info!("[active]"),
            EventKind::QueueIdle => {
                info!("[idle] active_ms={}", e.elapsed_ms.unwrap_or_default())
            }
            EventKind::AbortRequested => {
                warn!("[abort] {}", e.reason.as_deref().unwrap_or(""))
            }
            EventKind::SubscriberOverflow => warn!(
                "[subscriber-overflow] subscriber={work} reason={}",
                e.reason.as_deref().unwrap_or("unknown")
            ),
            EventKind::SubscriberPanicked => warn!(
                "[subscriber-panicked] subscriber={work} info={}",
                e.reason.as_deref().unwrap_or("unknown")
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
