//! # Orchestrator: runs the migration pipeline on a sequential queue.
//!
//! ```text
//! start(settings)
//!   ├─► validate settings            ── error ─► StartError (nothing enqueued)
//!   ├─► open run log + header        ── error ─► StartError
//!   ├─► factory: revisions → changesets → exporter?
//!   │                                ── error ─► close log, StartError
//!   ├─► fresh WorkQueue (N = 1) + run-log failure listener
//!   ├─► on_next_idle: close log, freeze counters, drop stages
//!   └─► enqueue_batch(stages)
//!
//! observer (polling): progress() / headline_status() / drain_exceptions()
//! ```
//!
//! ## Rules
//! - One run at a time; `start` while a run is active returns
//!   [`StartError::AlreadyRunning`].
//! - Settings are captured by value when a run starts.
//! - When the queue goes idle the run log is closed and the stage objects
//!   are released; the counters they reported are kept as a final snapshot
//!   until [`Orchestrator::release_stages`] is called.
//! - Lock order: current queue, then queue internals, then the run slot,
//!   then the run log. Idle handlers never touch the current-queue lock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::core::{QueueConfig, WorkQueue};
use crate::error::{RuntimeError, StartError};
use crate::pipeline::{ChangesetSource, RevisionSource, RunLog, Settings, StageFactory};
use crate::subscribers::Subscribe;
use crate::tracking::{QueueListener, WorkFailure, lock};
use crate::work::WorkRef;

/// Point-in-time view of a run for the observer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Latest non-empty status text of a running stage.
    pub status: Option<String>,
    /// Time the queue has spent active.
    pub elapsed: Duration,
    /// Files found by the revision scan.
    pub files: usize,
    /// Revisions found by the revision scan.
    pub revisions: usize,
    /// Changesets built so far.
    pub changesets: usize,
    /// `true` when nothing is running or pending.
    pub idle: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    files: usize,
    revisions: usize,
    changesets: usize,
}

struct LiveStages<F: StageFactory> {
    revisions: Arc<F::Revisions>,
    changesets: Arc<F::Changesets>,
}

impl<F: StageFactory> LiveStages<F> {
    fn counters(&self) -> Counters {
        Counters {
            files: self.revisions.file_count(),
            revisions: self.revisions.revision_count(),
            changesets: self.changesets.changeset_count(),
        }
    }
}

/// Resources owned by the current (or last) run.
struct RunSlot<F: StageFactory> {
    log: RunLog,
    live: Option<LiveStages<F>>,
    last: Counters,
}

impl<F: StageFactory> RunSlot<F> {
    fn empty() -> Self {
        Self {
            log: RunLog::null(),
            live: None,
            last: Counters::default(),
        }
    }

    /// Closes the log and freezes counters. Idempotent.
    fn settle(&mut self) {
        self.log.close();
        if let Some(live) = self.live.take() {
            self.last = live.counters();
        }
    }

    fn counters(&self) -> Counters {
        self.live.as_ref().map_or(self.last, LiveStages::counters)
    }
}

/// Writes one `ERROR:` line per failed stage to the run log.
struct RunLogFailures {
    log: RunLog,
}

impl QueueListener for RunLogFailures {
    fn on_exception(&self, failure: &WorkFailure) {
        self.log.write_line(format_args!("ERROR: {failure}"));
    }
}

/// Owns the pipeline runs of one front end.
///
/// Construct it once and keep it for as long as the front end lives;
/// every run gets its own [`WorkQueue`].
pub struct Orchestrator<F: StageFactory> {
    factory: F,
    cfg: QueueConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    queue: Mutex<Option<Arc<WorkQueue>>>,
    settings: Mutex<Option<Settings>>,
    slot: Arc<Mutex<RunSlot<F>>>,
}

impl<F: StageFactory> Orchestrator<F> {
    /// Creates an orchestrator whose runs execute one stage at a time.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            cfg: QueueConfig::sequential(),
            subscribers: Vec::new(),
            queue: Mutex::new(None),
            settings: Mutex::new(None),
            slot: Arc::new(Mutex::new(RunSlot::empty())),
        }
    }

    /// Attaches event subscribers to every future run.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// The stage factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Starts a run with `settings`.
    ///
    /// Must be called from within a tokio runtime. On error nothing has been
    /// enqueued and the run log, if it was opened, is closed again.
    pub fn start(&self, settings: Settings) -> Result<(), StartError> {
        let mut current = lock(&self.queue);
        if current.as_ref().is_some_and(|q| !q.is_idle()) {
            return Err(StartError::AlreadyRunning);
        }
        settings.validate().map_err(StartError::InvalidSettings)?;

        // the previous run may have been aborted before going active
        lock(&self.slot).settle();

        let log = RunLog::open_optional(settings.log_path())?;
        write_header(&log, &settings);

        let (live, works) = match self.prepare(&settings, &log) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "pipeline start failed");
                log.close();
                return Err(e);
            }
        };

        let queue = WorkQueue::builder(self.cfg.clone())
            .with_listener(Arc::new(RunLogFailures { log: log.clone() }))
            .with_subscribers(self.subscribers.clone())
            .build();

        {
            let mut slot = lock(&self.slot);
            slot.log = log;
            slot.live = Some(live);
            slot.last = Counters::default();
        }
        let slot = Arc::clone(&self.slot);
        queue.idle_gate().on_next_idle(move || {
            lock(&slot).settle();
            info!("pipeline run finished");
        });

        let ids = queue.enqueue_batch(works);
        info!(stages = ids.len(), project = %settings.vss_project, "pipeline run started");

        *lock(&self.settings) = Some(settings);
        *current = Some(queue);
        Ok(())
    }

    fn prepare(
        &self,
        settings: &Settings,
        log: &RunLog,
    ) -> Result<(LiveStages<F>, Vec<WorkRef>), StartError> {
        let stage_err = |stage: &str, e: crate::pipeline::StageError| StartError::Stage {
            stage: stage.to_string(),
            error: e.to_string(),
        };

        let revisions = self
            .factory
            .revisions(settings, log)
            .map_err(|e| stage_err("revisions", e))?;
        let changesets = self
            .factory
            .changesets(settings, log, &revisions)
            .map_err(|e| stage_err("changesets", e))?;

        let mut works: Vec<WorkRef> = Vec::with_capacity(3);
        works.push(revisions.clone());
        works.push(changesets.clone());
        if settings.exports() {
            let exporter = self
                .factory
                .exporter(settings, log, &revisions, &changesets)
                .map_err(|e| stage_err("exporter", e))?;
            works.push(exporter);
        }

        Ok((
            LiveStages {
                revisions,
                changesets,
            },
            works,
        ))
    }

    fn current(&self) -> Option<Arc<WorkQueue>> {
        lock(&self.queue).clone()
    }

    /// Asks the running stages to stop and drops the ones not started yet.
    pub fn abort(&self) {
        if let Some(q) = self.current() {
            q.abort();
            if q.is_idle() {
                lock(&self.slot).settle();
            }
        }
    }

    /// Waits until the current run is idle.
    pub async fn wait_idle(&self) {
        if let Some(q) = self.current() {
            q.wait_idle().await;
        }
    }

    /// Blocks the calling thread until the current run is idle.
    ///
    /// Must not be called from an async context.
    pub fn wait_idle_blocking(&self) {
        if let Some(q) = self.current() {
            futures::executor::block_on(q.wait_idle());
        }
    }

    /// Aborts and waits up to `grace` for the running stage to stop.
    ///
    /// The run log is closed whatever the outcome.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        let Some(q) = self.current() else {
            return Ok(());
        };
        let res = q.shutdown_within(grace).await;
        lock(&self.slot).settle();
        if let Err(e) = &res {
            warn!(error = %e, "pipeline did not stop in time");
        }
        res
    }

    /// `true` when no run is active.
    pub fn is_idle(&self) -> bool {
        self.current().is_none_or(|q| q.is_idle())
    }

    /// Status text of the stage that reported most recently.
    pub fn headline_status(&self) -> Option<String> {
        self.current().and_then(|q| q.status().headline())
    }

    /// Time the current (or last) run has spent active.
    pub fn elapsed(&self) -> Duration {
        self.current()
            .map_or(Duration::ZERO, |q| q.idle_gate().elapsed())
    }

    /// Returns and clears the failures recorded since the last call.
    pub fn drain_exceptions(&self) -> Vec<WorkFailure> {
        self.current()
            .map(|q| q.exceptions().drain_all())
            .unwrap_or_default()
    }

    /// Files found by the revision scan.
    pub fn file_count(&self) -> usize {
        lock(&self.slot).counters().files
    }

    /// Revisions found by the revision scan.
    pub fn revision_count(&self) -> usize {
        lock(&self.slot).counters().revisions
    }

    /// Changesets built by the second stage.
    pub fn changeset_count(&self) -> usize {
        lock(&self.slot).counters().changesets
    }

    /// Everything the observer shows, read in one go.
    pub fn progress(&self) -> ProgressSnapshot {
        let q = self.current();
        let counters = lock(&self.slot).counters();
        ProgressSnapshot {
            status: q.as_ref().and_then(|q| q.status().headline()),
            elapsed: q
                .as_ref()
                .map_or(Duration::ZERO, |q| q.idle_gate().elapsed()),
            files: counters.files,
            revisions: counters.revisions,
            changesets: counters.changesets,
            idle: q.is_none_or(|q| q.is_idle()),
        }
    }

    /// Forgets the stage objects and the counters of a finished run.
    ///
    /// Returns `false` (and keeps everything) while a run is active.
    pub fn release_stages(&self) -> bool {
        if !self.is_idle() {
            return false;
        }
        let mut slot = lock(&self.slot);
        slot.settle();
        slot.last = Counters::default();
        true
    }

    /// Settings of the current (or last) run.
    pub fn settings(&self) -> Option<Settings> {
        lock(&self.settings).clone()
    }
}

fn write_header(log: &RunLog, settings: &Settings) {
    log.write_line(format_args!(
        "{} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));
    if settings.encoding < 0 {
        log.write_line("Source encoding: platform default");
    } else {
        log.write_line(format_args!("Source encoding: code page {}", settings.encoding));
    }
    log.write_line(format_args!(
        "Comment transcoding: {}",
        enabled(settings.transcode_comments)
    ));
    log.write_line(format_args!(
        "Ignore errors: {}",
        enabled(settings.ignore_git_errors)
    ));
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}
