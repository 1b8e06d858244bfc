//! # migravisor
//!
//! **Migravisor** runs a source-control migration as a short pipeline of
//! long-running stages on a bounded-concurrency work queue, and gives a
//! polling front end (CLI or GUI timer) a consistent view of the run.
//!
//! It provides a FIFO scheduler with lifecycle hooks, the registries an
//! observer reads (status, failures, idleness), and an orchestrator that
//! binds a run log and the stage objects to the lifetime of a run.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Revisions   │   │  Changesets  │   │   Exporter   │
//!     │  (stage #1)  │   │  (stage #2)  │   │  (stage #3)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            └──────────────────┼──────────────────┘
//!                               ▼  enqueue_batch
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator (one per front end)                                 │
//! │  - validates Settings, opens the RunLog, builds stages            │
//! │  - closes the log and freezes counters on the idle edge           │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  WorkQueue (N slots, FIFO admission, cooperative abort)           │
//! └──────┬───────────────┬───────────────┬───────────────┬────────────┘
//!        │ on_start/stop │ on_exception  │ on_active/idle│ publish
//!        ▼               ▼               ▼               ▼
//!  StatusRegistry   ExceptionSink     IdleGate          Bus ──► SubscriberSet
//!  (headline)       (drain once)      (wait, elapsed)         (LogWriter, ...)
//!        ▲               ▲               ▲
//!        └───────────────┴───────────────┴──── observer polls (progress())
//! ```
//!
//! ### Lifecycle of a work item
//! ```text
//! enqueue ──► pending ──► slot acquired ──► on_start ──► run
//!                                                         ├─ Ok / Canceled
//!                                                         └─ Err / panic ──► on_exception
//!                                          on_stop ◄──────┘
//!                                          active == 0 && pending empty ──► on_idle
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Scheduling**    | Bounded-concurrency FIFO queue with lifecycle hooks.               | [`WorkQueue`], [`QueueListener`]            |
//! | **Observation**   | Headline status, drain-once failures, idle wait and active time.   | [`StatusRegistry`], [`ExceptionSink`], [`IdleGate`] |
//! | **Subscriber API**| Hook into queue lifecycle events (logging, metrics, dashboards).   | [`Subscribe`]                               |
//! | **Pipeline**      | Run the migration stages and report progress.                      | [`Orchestrator`], [`StageFactory`]          |
//! | **Errors**        | Typed errors for work items, run start and shutdown.               | [`WorkError`], [`StartError`], [`RuntimeError`] |
//! | **Work**          | Define work items as async or blocking closures.                   | [`WorkRef`], [`WorkFn`], [`BlockingWorkFn`] |
//! | **Configuration** | Queue settings and migration settings.                             | [`QueueConfig`], [`Settings`]               |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use migravisor::{QueueConfig, WorkContext, WorkError, WorkFn, WorkQueue};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let queue = WorkQueue::builder(QueueConfig::sequential()).build();
//!
//!     queue.enqueue(WorkFn::arc("hello", |ctx: WorkContext| async move {
//!         ctx.set_status("saying hello");
//!         println!("Hello from {}!", ctx.name());
//!         Ok::<(), WorkError>(())
//!     }));
//!     queue.enqueue(WorkFn::arc("broken", |_ctx: WorkContext| async move {
//!         Err::<(), _>(WorkError::fail("disk full"))
//!     }));
//!
//!     queue.wait_idle().await;
//!     for failure in queue.exceptions().drain_all() {
//!         eprintln!("{failure}");
//!     }
//! }
//! ```
mod core;
mod error;
mod events;
mod pipeline;
mod subscribers;
mod tracking;
mod work;

// ---- Public re-exports ----

pub use core::{QueueConfig, WorkQueue, WorkQueueBuilder, wait_for_shutdown_signal};
pub use error::{RuntimeError, StartError, WorkError};
pub use events::{Bus, Event, EventKind};
pub use pipeline::{
    ChangesetSource, Orchestrator, ProgressSnapshot, RevisionSource, RunLog, Settings,
    SettingsError, SettingsIssue, StageError, StageFactory,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tracking::{ExceptionSink, GateState, IdleGate, QueueListener, StatusRegistry, WorkFailure};
pub use work::{BlockingWorkFn, BoxWorkFuture, Work, WorkContext, WorkFn, WorkId, WorkRef};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
