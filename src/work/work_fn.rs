//! # Closure-backed work items
//!
//! [`WorkFn`] wraps an async closure `F: Fn(WorkContext) -> Fut`, producing a
//! fresh future per spawn. [`BlockingWorkFn`] wraps a synchronous closure and
//! runs it on tokio's blocking thread pool, which is where stages doing
//! file-system or process I/O belong.
//!
//! ## Example
//! ```rust
//! use migravisor::{WorkContext, WorkError, WorkFn, WorkRef};
//!
//! let w: WorkRef = WorkFn::arc("export", |ctx: WorkContext| async move {
//!     ctx.set_status("writing commits");
//!     Ok::<_, WorkError>(())
//! });
//! assert_eq!(w.name(), "export");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::error::WorkError;
use crate::work::item::{BoxWorkFuture, Work, panic_message};
use crate::work::WorkContext;

/// Async function-backed work item.
#[derive(Debug)]
pub struct WorkFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> WorkFn<F> {
    /// Creates a new function-backed work item.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the item and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> Work for WorkFn<F>
where
    F: Fn(WorkContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, ctx: WorkContext) -> BoxWorkFuture {
        Box::pin((self.f)(ctx))
    }
}

/// Blocking function-backed work item.
///
/// Each run occupies one thread of the blocking pool for its whole duration.
pub struct BlockingWorkFn<F> {
    name: Cow<'static, str>,
    f: Arc<F>,
}

impl<F> BlockingWorkFn<F> {
    /// Creates a new blocking work item.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Creates the item and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Work for BlockingWorkFn<F>
where
    F: Fn(WorkContext) -> Result<(), WorkError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, ctx: WorkContext) -> BoxWorkFuture {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(ctx)).await {
                Ok(res) => res,
                Err(join) if join.is_panic() => Err(WorkError::Panicked {
                    info: panic_message(&*join.into_panic()),
                }),
                Err(_) => Err(WorkError::Canceled),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::StatusRegistry;
    use crate::work::WorkId;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> WorkContext {
        WorkContext::new(
            WorkId::from_raw(1),
            "t".into(),
            CancellationToken::new(),
            Arc::new(StatusRegistry::new()),
        )
    }

    #[tokio::test]
    async fn blocking_work_reports_its_result() {
        let ok = BlockingWorkFn::new("ok", |_ctx: WorkContext| Ok(()));
        assert!(ok.spawn(ctx()).await.is_ok());

        let bad = BlockingWorkFn::new("bad", |_ctx: WorkContext| Err(WorkError::fail("io")));
        assert!(matches!(bad.spawn(ctx()).await, Err(WorkError::Fail { .. })));
    }

    #[tokio::test]
    async fn blocking_panic_becomes_work_error() {
        let w = BlockingWorkFn::new("boom", |_ctx: WorkContext| -> Result<(), WorkError> {
            panic!("disk on fire")
        });
        match w.spawn(ctx()).await {
            Err(WorkError::Panicked { info }) => assert_eq!(info, "disk on fire"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn each_spawn_creates_a_fresh_future() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = counter.clone();
        let w = WorkFn::new("count", move |_ctx: WorkContext| {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok::<(), WorkError>(())
            }
        });
        w.spawn(ctx()).await.unwrap();
        w.spawn(ctx()).await.unwrap();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
