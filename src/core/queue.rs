//! # WorkQueue: bounded-concurrency FIFO scheduler.
//!
//! The [`WorkQueue`] admits work items in enqueue order and runs at most
//! `max_concurrent` of them at once, each on its own tokio task. Lifecycle
//! transitions are reported synchronously to the registered
//! [`QueueListener`]s and, for observation, published on the event [`Bus`].
//!
//! ## Architecture
//! ```text
//! enqueue(work) ──► pending (FIFO) ──notify──► dispatcher loop
//!                                                 ├─► acquire slot (Semaphore, N permits)
//!                                                 ├─► admit head: active += 1
//!                                                 │     ├─► on_active   (0 → 1, was idle)
//!                                                 │     └─► on_start
//!                                                 └─► spawn worker ──► run_once(work)
//!                                                                        ├─► on_exception (failed)
//!                                                                        ├─► on_stop
//!                                                                        ├─► active -= 1
//!                                                                        │     └─► on_idle (0 active, 0 pending)
//!                                                                        └─► release slot
//! ```
//!
//! ## Rules
//! - `active <= max_concurrent` at all times (a slot is held before admission).
//! - An item is either pending or active, never both.
//! - Admission order is enqueue order; completion order is unspecified when N > 1.
//! - A failing item never halts the dispatcher.
//! - `on_active` / `on_idle` fire under the state lock and strictly alternate;
//!   the hand-off between two sequential items is not an idle transition.
//! - One-shot idle handlers run after the state lock is released, so pollers
//!   never wait on them.
//! - `abort()` is terminal: pending items are dropped, later enqueues are
//!   ignored, and running items see [`WorkContext::is_aborted`](crate::WorkContext::is_aborted).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::builder::WorkQueueBuilder;
use crate::core::config::QueueConfig;
use crate::core::runner::run_worker;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::tracking::{ExceptionSink, IdleGate, QueueListener, StatusRegistry, lock};
use crate::work::{WorkId, WorkRef};

/// An item sitting in the pending sequence.
struct Pending {
    id: WorkId,
    work: WorkRef,
}

/// An item that has been admitted on a slot.
pub(crate) struct Admitted {
    pub id: WorkId,
    pub name: Arc<str>,
    pub work: WorkRef,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Pending>,
    active: usize,
    /// Set between `on_active` and `on_idle`.
    engaged: bool,
    aborted: bool,
}

/// State shared between the queue handle, the dispatcher and the workers.
pub(crate) struct Shared {
    cfg: QueueConfig,
    bus: Bus,
    state: Mutex<QueueState>,
    wakeup: Notify,
    slots: Arc<Semaphore>,
    /// Cancelled when the last queue handle is dropped.
    runtime_token: CancellationToken,
    /// Child of `runtime_token`; cancelled by `abort()`.
    abort_token: CancellationToken,
    status: Arc<StatusRegistry>,
    exceptions: Arc<ExceptionSink>,
    gate: Arc<IdleGate>,
    listeners: Vec<Arc<dyn QueueListener>>,
}

impl Shared {
    pub(crate) fn new(
        cfg: QueueConfig,
        bus: Bus,
        runtime_token: CancellationToken,
        status: Arc<StatusRegistry>,
        exceptions: Arc<ExceptionSink>,
        gate: Arc<IdleGate>,
        listeners: Vec<Arc<dyn QueueListener>>,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(cfg.concurrency_limit()));
        let abort_token = runtime_token.child_token();
        Self {
            cfg,
            bus,
            state: Mutex::new(QueueState::default()),
            wakeup: Notify::new(),
            slots,
            runtime_token,
            abort_token,
            status,
            exceptions,
            gate,
            listeners,
        }
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn listeners(&self) -> &[Arc<dyn QueueListener>] {
        &self.listeners
    }

    pub(crate) fn abort_token(&self) -> CancellationToken {
        self.abort_token.clone()
    }

    pub(crate) fn status_registry(&self) -> Arc<StatusRegistry> {
        Arc::clone(&self.status)
    }

    /// Dispatcher loop: slot first, then the head of the pending sequence.
    pub(crate) async fn dispatch(self: Arc<Self>) {
        loop {
            let permit = tokio::select! {
                _ = self.abort_token.cancelled() => break,
                res = Arc::clone(&self.slots).acquire_owned() => match res {
                    Ok(permit) => permit,
                    Err(_closed) => break,
                },
            };

            let item = loop {
                if let Some(item) = self.admit_next() {
                    break item;
                }
                tokio::select! {
                    _ = self.abort_token.cancelled() => return,
                    _ = self.wakeup.notified() => {}
                }
            };

            let me = Arc::clone(&self);
            tokio::spawn(async move {
                run_worker(&me, item).await;
                drop(permit);
            });
        }
        debug!("dispatcher stopped");
    }

    /// Pops the head of the pending sequence and marks it active.
    fn admit_next(&self) -> Option<Admitted> {
        let mut st = lock(&self.state);
        if st.aborted {
            return None;
        }
        let Pending { id, work } = st.pending.pop_front()?;
        let name: Arc<str> = work.name().into();

        st.active += 1;
        if !st.engaged {
            st.engaged = true;
            self.fire_active();
        }
        for l in &self.listeners {
            l.on_start(id, &name);
        }
        self.bus
            .publish(Event::new(EventKind::WorkStarting).with_work(id, name.clone()));
        debug!(work = %name, %id, active = st.active, "work admitted");

        Some(Admitted { id, name, work })
    }

    /// Marks one worker as finished; fires `on_idle` if nothing is left.
    pub(crate) fn finish(&self) {
        let went_idle = {
            let mut st = lock(&self.state);
            st.active -= 1;
            let idle = st.active == 0 && st.pending.is_empty() && st.engaged;
            if idle {
                st.engaged = false;
                self.fire_idle();
            }
            idle
        };
        if went_idle {
            self.gate.complete_idle();
        }
    }

    fn fire_active(&self) {
        info!("queue active");
        for l in &self.listeners {
            l.on_active();
        }
        self.bus.publish(Event::new(EventKind::QueueActive));
    }

    fn fire_idle(&self) {
        for l in &self.listeners {
            l.on_idle();
        }
        let elapsed = self.gate.elapsed();
        info!(?elapsed, "queue idle");
        self.bus
            .publish(Event::new(EventKind::QueueIdle).with_elapsed(elapsed));
    }
}

/// Bounded-concurrency work queue.
///
/// Created through [`WorkQueue::builder`]; must be built inside a tokio
/// runtime. Dropping the last handle stops the dispatcher and signals abort
/// to items that are still running.
///
/// ## Example
/// ```rust
/// use migravisor::{QueueConfig, WorkContext, WorkError, WorkFn, WorkQueue};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = WorkQueue::builder(QueueConfig::sequential()).build();
///
/// queue.enqueue(WorkFn::arc("scan", |ctx: WorkContext| async move {
///     ctx.set_status("scanning");
///     Ok::<(), WorkError>(())
/// }));
/// queue.wait_idle().await;
///
/// assert!(queue.is_idle());
/// assert!(queue.exceptions().drain_all().is_empty());
/// # }
/// ```
pub struct WorkQueue {
    shared: Arc<Shared>,
}

impl WorkQueue {
    /// Creates a builder for a queue with the given configuration.
    pub fn builder(cfg: QueueConfig) -> WorkQueueBuilder {
        WorkQueueBuilder::new(cfg)
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Appends `work` to the pending sequence.
    ///
    /// Returns the identity assigned to this run, or `None` if the queue was
    /// aborted (the call is then a no-op).
    pub fn enqueue(&self, work: WorkRef) -> Option<WorkId> {
        let s = &self.shared;
        let id = {
            let mut st = lock(&s.state);
            if st.aborted {
                debug!(work = work.name(), "enqueue after abort ignored");
                return None;
            }
            let id = WorkId::next();
            s.bus
                .publish(Event::new(EventKind::WorkEnqueued).with_work(id, work.name()));
            st.pending.push_back(Pending { id, work });
            id
        };
        s.wakeup.notify_one();
        Some(id)
    }

    /// Appends several items atomically, in iteration order.
    ///
    /// No item of the batch can be admitted before all of them are pending,
    /// so a fast first item cannot drive the queue idle in between.
    /// Returns the assigned identities (empty if the queue was aborted).
    pub fn enqueue_batch(&self, works: impl IntoIterator<Item = WorkRef>) -> Vec<WorkId> {
        let s = &self.shared;
        let ids = {
            let mut st = lock(&s.state);
            if st.aborted {
                debug!("batch enqueue after abort ignored");
                return Vec::new();
            }
            works
                .into_iter()
                .map(|work| {
                    let id = WorkId::next();
                    s.bus.publish(
                        Event::new(EventKind::WorkEnqueued).with_work(id, work.name()),
                    );
                    st.pending.push_back(Pending { id, work });
                    id
                })
                .collect::<Vec<_>>()
        };
        s.wakeup.notify_one();
        ids
    }

    /// Stops admitting work and signals running items to stop.
    ///
    /// Pending items are dropped. Running items finish their current unit of
    /// work; they are never interrupted. Idempotent.
    pub fn abort(&self) {
        let s = &self.shared;
        let (dropped, went_idle) = {
            let mut st = lock(&s.state);
            if st.aborted {
                return;
            }
            st.aborted = true;
            let dropped = st.pending.len();
            st.pending.clear();
            let went_idle = st.active == 0 && st.engaged;
            if went_idle {
                st.engaged = false;
                s.fire_idle();
            } else if !st.engaged {
                // dropped items never reached the gate; wake `wait_idle` callers
                s.gate.touch();
            }
            (dropped, went_idle)
        };
        if went_idle {
            s.gate.complete_idle();
        }
        s.abort_token.cancel();
        info!(dropped, "queue aborted");
        s.bus.publish(
            Event::new(EventKind::AbortRequested).with_reason(format!("dropped_pending={dropped}")),
        );
    }

    /// Returns `true` once [`abort`](Self::abort) was called.
    pub fn is_aborted(&self) -> bool {
        lock(&self.shared.state).aborted
    }

    /// Returns `true` iff nothing is active and nothing is pending.
    ///
    /// After the last item stops this turns `true` only once the idle
    /// handlers have run.
    pub fn is_idle(&self) -> bool {
        let drained = {
            let st = lock(&self.shared.state);
            st.active == 0 && st.pending.is_empty()
        };
        drained && self.shared.gate.is_idle()
    }

    /// Number of items currently running.
    pub fn active_count(&self) -> usize {
        lock(&self.shared.state).active
    }

    /// Number of items waiting for a slot.
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.state).pending.len()
    }

    /// Configured concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.shared.cfg.concurrency_limit()
    }

    /// Waits until the queue is idle (nothing active, nothing pending).
    ///
    /// Items enqueued but not yet admitted keep the caller waiting even
    /// though the gate itself has not turned `Active` yet.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.gate.watch();
        loop {
            if self.is_idle() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Aborts, then waits up to the configured grace period for running items.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] with the names of the items
    /// still in flight if they did not stop in time.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.shutdown_within(self.shared.cfg.grace).await
    }

    /// Like [`shutdown`](Self::shutdown) with an explicit grace period.
    pub async fn shutdown_within(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.abort();
        match tokio::time::timeout(grace, self.wait_idle()).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(RuntimeError::GraceExceeded {
                grace,
                stuck: self.shared.status.snapshot(),
            }),
        }
    }

    /// Status registry fed by this queue.
    pub fn status(&self) -> &Arc<StatusRegistry> {
        &self.shared.status
    }

    /// Failure sink fed by this queue.
    pub fn exceptions(&self) -> &Arc<ExceptionSink> {
        &self.shared.exceptions
    }

    /// Idle gate fed by this queue.
    pub fn idle_gate(&self) -> &Arc<IdleGate> {
        &self.shared.gate
    }

    /// Event bus of this queue.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shared.runtime_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkError;
    use crate::work::{WorkContext, WorkFn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn noop(name: &'static str) -> WorkRef {
        WorkFn::arc(name, |_ctx: WorkContext| async { Ok::<(), WorkError>(()) })
    }

    #[tokio::test]
    async fn fresh_queue_is_idle() {
        let q = WorkQueue::builder(QueueConfig::default()).build();
        assert!(q.is_idle());
        q.wait_idle().await;
        assert_eq!(q.idle_gate().elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn runs_items_in_enqueue_order() {
        let q = WorkQueue::builder(QueueConfig::sequential()).build();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let order = order.clone();
            q.enqueue(WorkFn::arc(name, move |ctx: WorkContext| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(ctx.name().to_string());
                    Ok::<(), WorkError>(())
                }
            }));
        }
        q.wait_idle().await;
        assert!(q.is_idle());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn enqueue_after_abort_is_ignored() {
        let q = WorkQueue::builder(QueueConfig::default()).build();
        q.abort();
        q.abort();
        assert!(q.is_aborted());
        assert!(q.enqueue(noop("late")).is_none());
        assert!(q.is_idle());
    }

    #[tokio::test]
    async fn abort_before_admission_never_activates() {
        let q = WorkQueue::builder(QueueConfig::default()).build();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        q.enqueue(WorkFn::arc("never", move |_ctx: WorkContext| {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok::<(), WorkError>(())
            }
        }));
        // current-thread runtime: the dispatcher has not been polled yet
        q.abort();
        tokio::task::yield_now().await;

        assert!(q.is_idle());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(q.idle_gate().elapsed(), Duration::ZERO);
        assert_eq!(q.idle_gate().idle_transitions(), 0);
    }

    #[tokio::test]
    async fn sequential_hand_off_is_not_an_idle_transition() {
        let q = WorkQueue::builder(QueueConfig::sequential()).build();
        q.enqueue(noop("a"));
        q.enqueue(noop("b"));
        q.enqueue(noop("c"));
        q.wait_idle().await;
        assert_eq!(q.idle_gate().idle_transitions(), 1);
    }

    #[tokio::test]
    async fn shutdown_reports_stuck_items() {
        let cfg = QueueConfig {
            grace: Duration::from_millis(50),
            ..QueueConfig::default()
        };
        let q = WorkQueue::builder(cfg).build();
        q.enqueue(WorkFn::arc("stubborn", |_ctx: WorkContext| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), WorkError>(())
        }));
        while q.active_count() == 0 {
            tokio::task::yield_now().await;
        }

        match q.shutdown().await {
            Err(RuntimeError::GraceExceeded { stuck, .. }) => {
                assert_eq!(stuck, vec!["stubborn".to_string()])
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_waits_for_cooperative_items() {
        let q = WorkQueue::builder(QueueConfig::default()).build();
        q.enqueue(WorkFn::arc("polite", |ctx: WorkContext| async move {
            ctx.aborted().await;
            Err(WorkError::Canceled)
        }));
        while q.active_count() == 0 {
            tokio::task::yield_now().await;
        }
        q.shutdown().await.unwrap();
        assert!(q.is_idle());
        assert!(q.exceptions().is_empty());
    }

    #[tokio::test]
    async fn canceled_without_abort_is_recorded() {
        let q = WorkQueue::builder(QueueConfig::default()).build();
        q.enqueue(WorkFn::arc("quitter", |_ctx: WorkContext| async {
            Err::<(), _>(WorkError::Canceled)
        }));
        q.wait_idle().await;

        let failures = q.exceptions().drain_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(&*failures[0].work, "quitter");
        assert!(matches!(*failures[0].error, WorkError::Canceled));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn idle_handlers_do_not_block_pollers() {
        let q = WorkQueue::builder(QueueConfig::default()).build();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        q.idle_gate().on_next_idle(move || {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
        });

        q.enqueue(noop("only"));
        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // handler still running: the state lock is free, the gate is not open yet
        assert_eq!(q.active_count(), 0);
        assert!(!q.is_idle());

        release_tx.send(()).unwrap();
        q.wait_idle().await;
        assert!(q.is_idle());
    }
}
