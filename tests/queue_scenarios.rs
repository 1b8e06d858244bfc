//! End-to-end behaviour of the work queue and its registries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use migravisor::{
    QueueConfig, QueueListener, WorkContext, WorkError, WorkFailure, WorkFn, WorkId, WorkQueue,
    WorkRef,
};
use tokio::sync::{Notify, mpsc};

fn cfg(n: usize) -> QueueConfig {
    QueueConfig::with_concurrency(n)
}

fn step(name: &'static str, fail: bool) -> WorkRef {
    WorkFn::arc(name, move |ctx: WorkContext| async move {
        ctx.set_status(format!("{} running", ctx.name()));
        tokio::time::sleep(Duration::from_millis(5)).await;
        if fail {
            return Err(WorkError::fail(format!("{} broke", ctx.name())));
        }
        ctx.clear_status();
        Ok(())
    })
}

#[derive(Default)]
struct Journal {
    lines: Mutex<Vec<String>>,
}

impl Journal {
    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap())
    }
}

impl QueueListener for Journal {
    fn on_active(&self) {
        self.push("active".into());
    }
    fn on_idle(&self) {
        self.push("idle".into());
    }
    fn on_start(&self, _id: WorkId, name: &str) {
        self.push(format!("start {name}"));
    }
    fn on_stop(&self, _id: WorkId, name: &str) {
        self.push(format!("stop {name}"));
    }
    fn on_exception(&self, failure: &WorkFailure) {
        self.push(format!("exception {}", failure.work));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sequential_queue_isolates_a_failing_item() {
    let q = WorkQueue::builder(cfg(1)).build();
    q.enqueue_batch([step("one", false), step("two", true), step("three", false)]);

    q.wait_idle().await;

    assert!(q.is_idle());
    assert!(q.status().is_empty());
    assert_eq!(q.status().headline(), None);
    assert_eq!(q.idle_gate().idle_transitions(), 1);

    let failures = q.exceptions().drain_all();
    assert_eq!(failures.len(), 1);
    assert_eq!(&*failures[0].work, "two");
    assert!(matches!(*failures[0].error, WorkError::Fail { .. }));
    assert!(q.exceptions().drain_all().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hooks_fire_in_lifecycle_order() {
    let journal = Arc::new(Journal::default());
    let q = WorkQueue::builder(cfg(1))
        .with_listener(journal.clone())
        .build();

    q.enqueue_batch([step("a", false), step("b", true)]);
    q.wait_idle().await;

    assert_eq!(
        journal.take(),
        vec![
            "active",
            "start a",
            "stop a",
            "start b",
            "exception b",
            "stop b",
            "idle",
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn active_count_never_exceeds_the_limit() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let q = WorkQueue::builder(cfg(3)).build();
    for i in 0..12 {
        let (running, peak, done) = (running.clone(), peak.clone(), done.clone());
        q.enqueue(WorkFn::arc(format!("w{i}"), move |_ctx: WorkContext| {
            let (running, peak, done) = (running.clone(), peak.clone(), done.clone());
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), WorkError>(())
            }
        }));
        assert!(q.active_count() <= 3);
    }

    q.wait_idle().await;
    assert_eq!(done.load(Ordering::SeqCst), 12);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(q.active_count(), 0);
    assert_eq!(q.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn headline_moves_to_the_other_item_without_a_gap() {
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<&'static str>();
    let go_b = Arc::new(Notify::new());
    let clear_b = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let a = {
        let (ready_tx, release) = (ready_tx.clone(), release.clone());
        WorkFn::arc("a", move |ctx: WorkContext| {
            let (ready_tx, release) = (ready_tx.clone(), release.clone());
            async move {
                ctx.set_status("scanning a");
                let _ = ready_tx.send("a set");
                release.notified().await;
                Ok::<(), WorkError>(())
            }
        })
    };
    let b = {
        let (ready_tx, go_b, clear_b) = (ready_tx.clone(), go_b.clone(), clear_b.clone());
        WorkFn::arc("b", move |ctx: WorkContext| {
            let (ready_tx, go_b, clear_b) = (ready_tx.clone(), go_b.clone(), clear_b.clone());
            async move {
                go_b.notified().await;
                ctx.set_status("scanning b");
                let _ = ready_tx.send("b set");
                clear_b.notified().await;
                ctx.clear_status();
                let _ = ready_tx.send("b cleared");
                Ok::<(), WorkError>(())
            }
        })
    };

    let q = WorkQueue::builder(cfg(2)).build();
    q.enqueue_batch([a as WorkRef, b as WorkRef]);

    assert_eq!(ready_rx.recv().await, Some("a set"));
    assert_eq!(q.status().headline().as_deref(), Some("scanning a"));

    go_b.notify_one();
    assert_eq!(ready_rx.recv().await, Some("b set"));
    assert_eq!(q.status().headline().as_deref(), Some("scanning b"));

    clear_b.notify_one();
    assert_eq!(ready_rx.recv().await, Some("b cleared"));
    assert_eq!(q.status().headline().as_deref(), Some("scanning a"));

    release.notify_one();
    q.wait_idle().await;
    assert_eq!(q.status().headline(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abort_stops_the_running_item_and_drops_the_rest() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel::<()>();
    let later_ran = Arc::new(AtomicUsize::new(0));

    let patient = WorkFn::arc("patient", move |ctx: WorkContext| {
        let started_tx = started_tx.clone();
        async move {
            ctx.set_status("waiting for abort");
            let _ = started_tx.send(());
            ctx.aborted().await;
            Err::<(), _>(WorkError::Canceled)
        }
    });
    let later = {
        let later_ran = later_ran.clone();
        WorkFn::arc("later", move |_ctx: WorkContext| {
            let later_ran = later_ran.clone();
            async move {
                later_ran.fetch_add(1, Ordering::SeqCst);
                Ok::<(), WorkError>(())
            }
        })
    };

    let q = WorkQueue::builder(cfg(1)).build();
    q.enqueue_batch([patient as WorkRef, later as WorkRef]);
    started_rx.recv().await;

    q.abort();
    q.abort();
    assert!(q.enqueue(step("ignored", false)).is_none());

    q.wait_idle().await;
    assert!(q.is_aborted());
    assert_eq!(later_ran.load(Ordering::SeqCst), 0);
    assert!(q.exceptions().is_empty());
    assert!(q.status().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_items_share_the_queue() {
    let q = WorkQueue::builder(cfg(1)).build();
    let disk: WorkRef = migravisor::BlockingWorkFn::arc("disk", |ctx: WorkContext| {
        ctx.set_status("copying");
        std::thread::sleep(Duration::from_millis(5));
        Ok::<(), WorkError>(())
    });
    q.enqueue_batch([disk, step("after", false)]);

    q.wait_idle().await;
    assert!(q.exceptions().is_empty());
    assert_eq!(q.idle_gate().idle_transitions(), 1);
}
