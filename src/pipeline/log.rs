//! Plain-text run log shared by the orchestrator and the stages.
//!
//! A [`RunLog`] is either a file or a null sink. Clones share the same
//! handle, so closing one closes all of them; writes after close are
//! silently dropped.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::tracking::lock;

/// Shared, closable line writer.
#[derive(Clone, Default)]
pub struct RunLog {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl RunLog {
    /// A log that discards everything.
    pub fn null() -> Self {
        Self::default()
    }

    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
        })
    }

    /// Opens `path` if given, otherwise returns a null log.
    pub fn open_optional(path: Option<&Path>) -> io::Result<Self> {
        match path {
            Some(p) => Self::create(p),
            None => Ok(Self::null()),
        }
    }

    /// Returns `true` while the log has an open file.
    pub fn is_open(&self) -> bool {
        lock(&self.inner).is_some()
    }

    /// Appends one line.
    ///
    /// Write errors are reported through `tracing` and otherwise ignored;
    /// the run log never fails a stage.
    pub fn write_line(&self, line: impl Display) {
        let mut guard = lock(&self.inner);
        if let Some(w) = guard.as_mut() {
            if let Err(e) = writeln!(w, "{line}") {
                warn!(error = %e, "run log write failed");
            }
        }
    }

    /// Flushes and closes the file. Idempotent.
    pub fn close(&self) {
        if let Some(mut w) = lock(&self.inner).take() {
            if let Err(e) = w.flush() {
                warn!(error = %e, "run log flush failed");
            }
        }
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog")
            .field("open", &self.is_open())
            .finish()
    }
}
