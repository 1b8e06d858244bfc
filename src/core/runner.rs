//! # Run a single work item.
//!
//! Executes one admitted item, isolates its failure, and reports the outcome.
//!
//! ## Event flow
//! ```text
//! Success / cancellation:
//!   work.spawn() → Ok(()) | Err(Canceled) → on_stop → publish WorkStopped
//!
//! Failure / panic:
//!   work.spawn() → Err(Fail/Fatal) | panic → on_exception → publish WorkFailed
//!                                          → on_stop      → publish WorkStopped
//! ```
//!
//! ## Rules
//! - Always ends with **exactly one** `on_stop` / `WorkStopped`.
//! - A panic (while creating or polling the future) is caught and becomes
//!   [`WorkError::Panicked`]; it never takes the worker down.
//! - `Canceled` is a graceful exit, not an exception.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::queue::{Admitted, Shared};
use crate::error::WorkError;
use crate::events::{Event, EventKind};
use crate::tracking::WorkFailure;
use crate::work::{Work, WorkContext, panic_message};

/// Runs `work` to completion, converting panics into [`WorkError::Panicked`].
pub(crate) async fn run_once(work: &dyn Work, ctx: WorkContext) -> Result<(), WorkError> {
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| work.spawn(ctx))) {
        Ok(fut) => fut,
        Err(panic) => {
            return Err(WorkError::Panicked {
                info: panic_message(&*panic),
            });
        }
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(WorkError::Panicked {
            info: panic_message(&*panic),
        }),
    }
}

/// Worker body: runs one admitted item and fires its completion hooks.
///
/// The caller holds the concurrency slot for the whole call.
pub(crate) async fn run_worker(shared: &Shared, item: Admitted) {
    let Admitted { id, name, work } = item;
    let ctx = WorkContext::new(
        id,
        name.clone(),
        shared.abort_token(),
        shared.status_registry(),
    );

    let started = Instant::now();
    let res = run_once(work.as_ref(), ctx).await;
    let elapsed = started.elapsed();

    match res {
        Ok(()) => debug!(work = %name, %id, ?elapsed, "work finished"),
        Err(err) if !err.is_failure() && shared.abort_token().is_cancelled() => {
            debug!(work = %name, %id, "work stopped after abort")
        }
        Err(err) => {
            warn!(work = %name, %id, error = %err, "work failed");
            shared.bus().publish(
                Event::new(EventKind::WorkFailed)
                    .with_work(id, name.clone())
                    .with_reason(err.to_string()),
            );
            let failure = WorkFailure::new(id, name.clone(), err);
            for l in shared.listeners() {
                l.on_exception(&failure);
            }
        }
    }

    for l in shared.listeners() {
        l.on_stop(id, &name);
    }
    shared.bus().publish(
        Event::new(EventKind::WorkStopped)
            .with_work(id, name)
            .with_elapsed(elapsed),
    );
    shared.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::StatusRegistry;
    use crate::work::{BoxWorkFuture, WorkFn, WorkId};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> WorkContext {
        WorkContext::new(
            WorkId::from_raw(1),
            "t".into(),
            CancellationToken::new(),
            Arc::new(StatusRegistry::new()),
        )
    }

    struct PanicsOnSpawn;

    impl Work for PanicsOnSpawn {
        fn name(&self) -> &str {
            "eager"
        }
        fn spawn(&self, _ctx: WorkContext) -> BoxWorkFuture {
            panic!("before the future existed")
        }
    }

    #[tokio::test]
    async fn panic_while_polling_is_caught() {
        let w = WorkFn::new("lazy", |_ctx: WorkContext| async move {
            if true {
                panic!("mid-flight");
            }
            Ok::<(), WorkError>(())
        });
        match run_once(&w, ctx()).await {
            Err(WorkError::Panicked { info }) => assert_eq!(info, "mid-flight"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn panic_while_spawning_is_caught() {
        match run_once(&PanicsOnSpawn, ctx()).await {
            Err(WorkError::Panicked { info }) => assert_eq!(info, "before the future existed"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
