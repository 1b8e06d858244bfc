//! # Migration pipeline on top of the work queue.
//!
//! - [`Orchestrator`] - starts runs, forwards abort, exposes progress to the observer
//! - [`StageFactory`] - builds the three stages of a run ([`RevisionSource`],
//!   [`ChangesetSource`], exporter)
//! - [`Settings`] - migration settings loaded from `KEY=VALUE` text
//! - [`RunLog`] - plain-text log whose lifetime is bound to the run

mod log;
mod orchestrator;
mod settings;
mod stages;

pub use log::RunLog;
pub use orchestrator::{Orchestrator, ProgressSnapshot};
pub use settings::{Settings, SettingsError, SettingsIssue};
pub use stages::{ChangesetSource, RevisionSource, StageError, StageFactory};
