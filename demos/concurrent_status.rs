//! # Example: Headline status with concurrent items
//!
//! Runs four items on a queue with two slots and polls the headline status
//! the way a progress bar would. A listener prints the lifecycle hooks.
//!
//! ## Run
//! ```bash
//! cargo run --example concurrent_status
//! ```

use std::sync::Arc;
use std::time::Duration;

use migravisor::{
    QueueConfig, QueueListener, WorkContext, WorkError, WorkFailure, WorkFn, WorkId, WorkQueue,
    WorkRef,
};

struct Printer;

impl QueueListener for Printer {
    fn on_active(&self) {
        println!("── queue active");
    }
    fn on_idle(&self) {
        println!("── queue idle");
    }
    fn on_start(&self, id: WorkId, name: &str) {
        println!("   start {name} {id}");
    }
    fn on_stop(&self, id: WorkId, name: &str) {
        println!("   stop  {name} {id}");
    }
    fn on_exception(&self, failure: &WorkFailure) {
        println!("   fail  {failure}");
    }
}

fn copier(name: &'static str, chunks: u32, chunk_ms: u64) -> WorkRef {
    WorkFn::arc(name, move |ctx: WorkContext| async move {
        for chunk in 1..=chunks {
            if ctx.is_aborted() {
                return Err(WorkError::Canceled);
            }
            ctx.set_status(format!("{name}: chunk {chunk}/{chunks}"));
            tokio::time::sleep(Duration::from_millis(chunk_ms)).await;
        }
        if name == "flaky" {
            return Err(WorkError::fail("checksum mismatch"));
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let queue = WorkQueue::builder(QueueConfig::with_concurrency(2))
        .with_listener(Arc::new(Printer))
        .build();

    queue.enqueue_batch([
        copier("alpha", 5, 60),
        copier("beta", 3, 90),
        copier("flaky", 2, 70),
        copier("gamma", 4, 40),
    ]);

    let mut last = None;
    while !queue.is_idle() {
        let headline = queue.status().headline();
        if headline != last {
            println!("[{:>5} ms] {}", queue.idle_gate().elapsed().as_millis(), headline.as_deref().unwrap_or("-"));
            last = headline;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    queue.wait_idle().await;

    for failure in queue.exceptions().drain_all() {
        eprintln!("ERROR: {failure}");
    }
    println!("active for {:?}", queue.idle_gate().elapsed());
    Ok(())
}
