//! # Contracts for the three pipeline stages.
//!
//! The orchestrator does not know how a migration is performed. It asks a
//! [`StageFactory`] for the stage objects of a run, in dependency order,
//! and enqueues them as work items:
//!
//! ```text
//! revisions ──► changesets ──► exporter (only when a target is configured)
//!     │              │
//!     └──────────────┴──► counters read by the observer while the run lasts
//! ```
//!
//! Each stage is a [`Work`] and additionally exposes the progress counters
//! the observer polls. Counters must be cheap and safe to read from any
//! thread while the stage is running.

use std::error::Error;
use std::sync::Arc;

use crate::pipeline::{RunLog, Settings};
use crate::work::{Work, WorkRef};

/// Error returned by a factory that cannot prepare a stage.
pub type StageError = Box<dyn Error + Send + Sync + 'static>;

/// First stage: walks the source project and collects file revisions.
pub trait RevisionSource: Work {
    /// Files discovered so far.
    fn file_count(&self) -> usize;
    /// Revisions discovered so far.
    fn revision_count(&self) -> usize;
}

/// Second stage: groups revisions into changesets.
pub trait ChangesetSource: Work {
    /// Changesets built so far.
    fn changeset_count(&self) -> usize;
}

/// Builds the stage objects of one run.
///
/// Called synchronously from `Orchestrator::start`; an error aborts the
/// start before anything is enqueued.
pub trait StageFactory: Send + Sync + 'static {
    /// Concrete first stage.
    type Revisions: RevisionSource;
    /// Concrete second stage.
    type Changesets: ChangesetSource;

    /// Prepares the revision scan.
    fn revisions(
        &self,
        settings: &Settings,
        log: &RunLog,
    ) -> Result<Arc<Self::Revisions>, StageError>;

    /// Prepares the changeset build; consumes the revision stage's output.
    fn changesets(
        &self,
        settings: &Settings,
        log: &RunLog,
        revisions: &Arc<Self::Revisions>,
    ) -> Result<Arc<Self::Changesets>, StageError>;

    /// Prepares the export; consumes both earlier stages' output.
    ///
    /// Only called when [`Settings::exports`] is `true`.
    fn exporter(
        &self,
        settings: &Settings,
        log: &RunLog,
        revisions: &Arc<Self::Revisions>,
        changesets: &Arc<Self::Changesets>,
    ) -> Result<WorkRef, StageError>;
}
