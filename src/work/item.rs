//! # Work abstraction and identity.
//!
//! A [`Work`] is the opaque unit the queue schedules: a stable name plus a
//! method producing a fresh future per run. The queue pairs each enqueued
//! item with a [`WorkId`] that stays unique for the lifetime of the process.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::WorkError;
use crate::work::WorkContext;

/// Boxed future returned by [`Work::spawn`].
pub type BoxWorkFuture = Pin<Box<dyn Future<Output = Result<(), WorkError>> + Send + 'static>>;

/// Shared handle to a work item.
pub type WorkRef = Arc<dyn Work>;

/// # Cancelable unit of work.
///
/// Implementors should check [`WorkContext::is_aborted`] between units of
/// work and return [`WorkError::Canceled`] (or `Ok`) promptly once it is set.
///
/// # Example
/// ```
/// use migravisor::{BoxWorkFuture, Work, WorkContext, WorkError};
///
/// struct Scan;
///
/// impl Work for Scan {
///     fn name(&self) -> &str { "scan" }
///
///     fn spawn(&self, ctx: WorkContext) -> BoxWorkFuture {
///         Box::pin(async move {
///             for dir in ["a", "b"] {
///                 if ctx.is_aborted() {
///                     return Err(WorkError::Canceled);
///                 }
///                 ctx.set_status(format!("scanning {dir}"));
///             }
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Work: Send + Sync + 'static {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Creates the future for one run of this item.
    fn spawn(&self, ctx: WorkContext) -> BoxWorkFuture;
}

static NEXT_WORK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an enqueued work item.
///
/// Ids are allocated from a process-wide counter, so two enqueues of the same
/// [`WorkRef`] still get distinct identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkId(u64);

impl WorkId {
    pub(crate) fn next() -> Self {
        WorkId(NEXT_WORK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Builds an id from a raw value (tests and event construction).
    pub fn from_raw(raw: u64) -> Self {
        WorkId(raw)
    }

    /// Returns the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = WorkId::next();
        let b = WorkId::next();
        assert!(b > a);
        assert_eq!(WorkId::from_raw(a.as_u64()), a);
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
