//! # Idle gate: wait for idleness, react to the idle edge, measure active time.
//!
//! ## State machine
//! ```text
//!            on_active (start stopwatch)
//!   ┌──────┐ ───────────────────────────► ┌────────┐
//!   │ Idle │                              │ Active │  waiters block here
//!   └──────┘ ◄─────────────────────────── └────────┘
//!            on_idle (stop stopwatch, queue one-shot handlers)
//!            complete_idle (run handlers, release waiters)
//! ```
//!
//! ## Rules
//! - The stopwatch accumulates strictly while the gate is `Active`.
//! - One-shot handlers registered with [`IdleGate::on_next_idle`] run exactly
//!   once, on the next Active → Idle transition.
//! - `on_idle` only records the edge; handlers run and the state turns `Idle`
//!   in [`IdleGate::complete_idle`], which the queue calls after releasing its
//!   own lock. A reactivation in between keeps the gate `Active`.
//! - A fresh gate is `Idle` with zero elapsed time.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::tracking::{QueueListener, lock};

/// Binary state of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No work active or pending.
    Idle,
    /// At least one worker is running.
    Active,
}

type IdleHandler = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct Stopwatch {
    accumulated: Duration,
    started: Option<Instant>,
}

impl Stopwatch {
    fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(at) = self.started.take() {
            self.accumulated += at.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started.map(|at| at.elapsed()).unwrap_or_default()
    }
}

#[derive(Default)]
struct Phase {
    clock: Stopwatch,
    idle_pending: bool,
    due: Vec<IdleHandler>,
}

/// Blocking wait primitive plus idle-edge notification.
pub struct IdleGate {
    state: watch::Sender<GateState>,
    phase: Mutex<Phase>,
    handlers: Mutex<Vec<IdleHandler>>,
    idle_edges: AtomicU64,
}

impl Default for IdleGate {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleGate {
    /// Creates an idle gate with a zeroed stopwatch.
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(GateState::Idle);
        Self {
            state,
            phase: Mutex::new(Phase::default()),
            handlers: Mutex::new(Vec::new()),
            idle_edges: AtomicU64::new(0),
        }
    }

    /// Current gate state.
    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Returns `true` if the gate is open (no work active).
    pub fn is_idle(&self) -> bool {
        self.state() == GateState::Idle
    }

    /// Cumulative time spent `Active`, including the current stretch.
    pub fn elapsed(&self) -> Duration {
        lock(&self.phase).clock.elapsed()
    }

    /// Number of Active → Idle transitions so far.
    pub fn idle_transitions(&self) -> u64 {
        self.idle_edges.load(Ordering::Acquire)
    }

    /// Waits until the gate is `Idle`.
    ///
    /// Returns immediately if it already is.
    pub async fn wait_idle(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|s| *s == GateState::Idle).await;
    }

    /// Blocks the current thread until the gate is `Idle`.
    ///
    /// Must not be called from inside an async context; use [`wait_idle`](Self::wait_idle) there.
    pub fn wait_idle_blocking(&self) {
        futures::executor::block_on(self.wait_idle());
    }

    /// Subscribes to gate state changes.
    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Notifies watchers without changing the state.
    pub(crate) fn touch(&self) {
        self.state.send_modify(|_| {});
    }

    /// Registers `f` to run once on the next Active → Idle transition.
    pub fn on_next_idle(&self, f: impl FnOnce() + Send + 'static) {
        lock(&self.handlers).push(Box::new(f));
    }

    /// Runs the handlers queued by `on_idle`, then turns the gate `Idle`
    /// unless it was reactivated meanwhile.
    ///
    /// Must be called without holding any lock a handler may take.
    pub fn complete_idle(&self) {
        let due = std::mem::take(&mut lock(&self.phase).due);
        for handler in due {
            handler();
        }
        let mut phase = lock(&self.phase);
        if phase.idle_pending {
            phase.idle_pending = false;
            self.state.send_replace(GateState::Idle);
        }
    }
}

impl QueueListener for IdleGate {
    fn on_active(&self) {
        let mut phase = lock(&self.phase);
        phase.clock.start();
        phase.idle_pending = false;
        self.state.send_replace(GateState::Active);
    }

    fn on_idle(&self) {
        let mut phase = lock(&self.phase);
        phase.clock.stop();
        phase.idle_pending = true;
        phase.due.append(&mut lock(&self.handlers));
        self.idle_edges.fetch_add(1, Ordering::AcqRel);
    }
}
