//! Error types used by the migravisor runtime, work items and the pipeline.
//!
//! This module defines the error enums:
//!
//! - [`WorkError`]: errors raised by individual work items.
//! - [`StartError`]: errors raised synchronously when a pipeline run is started.
//! - [`RuntimeError`]: errors raised by the runtime itself during shutdown.
//!
//! All of them provide `as_label` for logging/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::pipeline::SettingsIssue;

/// # Errors produced by the migravisor runtime.
///
/// These represent failures in the scheduling layer itself,
/// such as a graceful shutdown exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some work items were still in flight.
    #[error("shutdown timeout {grace:?} exceeded; in flight: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of work items that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use migravisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced by work item execution.
///
/// A failing item never halts the queue: the failure is handed to the
/// listeners (`on_exception`) and the next pending item is admitted.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkError {
    /// Work failed; the remaining items keep running.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work failed in a way the item considers unrecoverable.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Work observed the abort flag and stopped early.
    ///
    /// Treated as a graceful stop, never recorded as an exception.
    #[error("work cancelled")]
    Canceled,

    /// Work panicked; the panic was caught by the worker.
    #[error("work panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl WorkError {
    /// Shorthand for [`WorkError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        WorkError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`WorkError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        WorkError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use migravisor::WorkError;
    ///
    /// assert_eq!(WorkError::fail("boom").as_label(), "work_failed");
    /// assert_eq!(WorkError::Canceled.as_label(), "work_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Fail { .. } => "work_failed",
            WorkError::Fatal { .. } => "work_fatal",
            WorkError::Canceled => "work_canceled",
            WorkError::Panicked { .. } => "work_panicked",
        }
    }

    /// Returns `true` if this outcome is a failure worth recording.
    ///
    /// Everything except [`WorkError::Canceled`] counts. The queue still
    /// records `Canceled` from an item when it was not aborted.
    pub fn is_failure(&self) -> bool {
        !matches!(self, WorkError::Canceled)
    }
}

/// # Errors raised synchronously by `Orchestrator::start`.
///
/// When one of these is returned nothing has been enqueued and any
/// partially opened resource (the run log) has already been released.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartError {
    /// A previous run is still active.
    #[error("a pipeline run is already in progress")]
    AlreadyRunning,

    /// Settings did not pass validation.
    #[error("invalid settings: {}", render_issues(.0))]
    InvalidSettings(Vec<SettingsIssue>),

    /// The run log could not be opened.
    #[error("cannot open run log: {0}")]
    Log(#[from] std::io::Error),

    /// A stage collaborator refused to be constructed.
    #[error("stage '{stage}' could not be prepared: {error}")]
    Stage {
        /// Stage name.
        stage: String,
        /// Reason reported by the stage factory.
        error: String,
    },
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::AlreadyRunning => "start_already_running",
            StartError::InvalidSettings(_) => "start_invalid_settings",
            StartError::Log(_) => "start_log",
            StartError::Stage { .. } => "start_stage",
        }
    }
}

fn render_issues(issues: &[SettingsIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_is_not_a_failure() {
        assert!(!WorkError::Canceled.is_failure());
        assert!(WorkError::fail("x").is_failure());
        assert!(WorkError::fatal("x").is_failure());
        assert!(WorkError::Panicked { info: "p".into() }.is_failure());
    }

    #[test]
    fn invalid_settings_lists_every_issue() {
        let err = StartError::InvalidSettings(vec![
            SettingsIssue::MissingKey("VSS_DIRECTORY"),
            SettingsIssue::UnknownKey("COLOR".into()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("VSS_DIRECTORY"), "{msg}");
        assert!(msg.contains("COLOR"), "{msg}");
        assert_eq!(err.as_label(), "start_invalid_settings");
    }
}
