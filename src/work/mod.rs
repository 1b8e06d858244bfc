//! # Work item abstractions.
//!
//! This module provides the work-related types:
//! - [`Work`] - trait for implementing cancelable units of work
//! - [`WorkFn`] - async closure-backed implementation
//! - [`BlockingWorkFn`] - blocking closure run on the blocking thread pool
//! - [`WorkRef`] - shared reference to a work item (`Arc<dyn Work>`)
//! - [`WorkId`] - identity of an admitted item
//! - [`WorkContext`] - per-run handle to cancellation and status reporting

mod context;
mod item;
mod work_fn;

pub use context::WorkContext;
pub use item::{BoxWorkFuture, Work, WorkId, WorkRef};
pub use work_fn::{BlockingWorkFn, WorkFn};

pub(crate) use item::panic_message;
