//! # Example: Migration front end
//!
//! Loads a settings file, runs three simulated stages over the files under
//! `VSS_DIRECTORY`, polls progress on a timer and prints drained failures.
//!
//! - revisions: walks the source tree, one "revision" per 4 KiB of content
//! - changesets: one changeset per directory that holds files
//! - exporter: writes `CHANGESETS.txt` into `GIT_DIRECTORY` (if configured)
//!
//! Exit codes: `0` done, `100` settings file not found, `200` invalid
//! settings, `1` anything else.
//!
//! ## Run
//! ```bash
//! cat > /tmp/migrate.conf <<EOF
//! VSS_DIRECTORY=./src
//! VSS_PROJECT=$/demo
//! GIT_DIRECTORY=/tmp/migrate-out
//! LOG_FILE=/tmp/migrate.log
//! EOF
//! RUST_LOG=info cargo run --example migrate --features logging -- --settings /tmp/migrate.conf
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use migravisor::{
    BoxWorkFuture, ChangesetSource, LogWriter, Orchestrator, RevisionSource, RunLog, Settings,
    SettingsError, StageError, StageFactory, StartError, Subscribe, Work, WorkContext, WorkError,
    WorkFn, WorkRef, wait_for_shutdown_signal,
};

const EXIT_UNKNOWN: u8 = 1;
const EXIT_NOT_FOUND: u8 = 100;
const EXIT_INVALID_SETTINGS: u8 = 200;

#[derive(Parser, Debug)]
#[command(about = "Run a simulated migration from a settings file")]
struct Args {
    /// Settings file (KEY=VALUE lines).
    #[arg(short, long)]
    settings: PathBuf,

    /// Progress polling interval in milliseconds.
    #[arg(long, default_value_t = 250)]
    poll_ms: u64,

    /// How long to wait for the running stage after Ctrl-C.
    #[arg(long, default_value_t = 10)]
    grace_secs: u64,

    /// Also print every queue event.
    #[arg(long)]
    events: bool,
}

/// Files discovered by the scan, shared with the later stages.
#[derive(Default)]
struct Discovered {
    files: AtomicUsize,
    revisions: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

struct FileScan {
    root: PathBuf,
    excludes: Vec<String>,
    found: Arc<Discovered>,
    log: RunLog,
}

impl Work for FileScan {
    fn name(&self) -> &str {
        "revisions"
    }

    fn spawn(&self, ctx: WorkContext) -> BoxWorkFuture {
        let root = self.root.clone();
        let excludes = self.excludes.clone();
        let found = self.found.clone();
        let log = self.log.clone();
        Box::pin(async move {
            let mut dirs = vec![root];
            while let Some(dir) = dirs.pop() {
                if ctx.is_aborted() {
                    return Err(WorkError::Canceled);
                }
                ctx.set_status(format!("scanning {}", dir.display()));
                let mut entries = tokio::fs::read_dir(&dir)
                    .await
                    .map_err(|e| WorkError::fail(format!("{}: {e}", dir.display())))?;
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| WorkError::fail(e.to_string()))?
                {
                    let path = entry.path();
                    let text = path.to_string_lossy();
                    if excludes.iter().any(|p| text.contains(p.as_str())) {
                        continue;
                    }
                    let meta = entry
                        .metadata()
                        .await
                        .map_err(|e| WorkError::fail(e.to_string()))?;
                    if meta.is_dir() {
                        dirs.push(path);
                    } else {
                        found.files.fetch_add(1, Ordering::Relaxed);
                        found
                            .revisions
                            .fetch_add(meta.len() as usize / 4096 + 1, Ordering::Relaxed);
                        found
                            .paths
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(path);
                    }
                }
            }
            log.write_line(format_args!(
                "Found {} files, {} revisions",
                found.files.load(Ordering::Relaxed),
                found.revisions.load(Ordering::Relaxed)
            ));
            Ok(())
        })
    }
}

impl RevisionSource for FileScan {
    fn file_count(&self) -> usize {
        self.found.files.load(Ordering::Relaxed)
    }

    fn revision_count(&self) -> usize {
        self.found.revisions.load(Ordering::Relaxed)
    }
}

struct DirectoryChangesets {
    found: Arc<Discovered>,
    dirs: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl Work for DirectoryChangesets {
    fn name(&self) -> &str {
        "changesets"
    }

    fn spawn(&self, ctx: WorkContext) -> BoxWorkFuture {
        let found = self.found.clone();
        let dirs = self.dirs.clone();
        Box::pin(async move {
            let paths = found
                .paths
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for (n, path) in paths.iter().enumerate() {
                if ctx.is_aborted() {
                    return Err(WorkError::Canceled);
                }
                if n % 64 == 0 {
                    ctx.set_status(format!("grouping {n}/{}", paths.len()));
                    tokio::task::yield_now().await;
                }
                if let Some(parent) = path.parent() {
                    dirs.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(parent.to_path_buf());
                }
            }
            Ok(())
        })
    }
}

impl ChangesetSource for DirectoryChangesets {
    fn changeset_count(&self) -> usize {
        self.dirs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct Simulated;

impl StageFactory for Simulated {
    type Revisions = FileScan;
    type Changesets = DirectoryChangesets;

    fn revisions(&self, settings: &Settings, log: &RunLog) -> Result<Arc<FileScan>, StageError> {
        Ok(Arc::new(FileScan {
            root: PathBuf::from(&settings.vss_directory),
            excludes: settings.exclude_paths().into_iter().map(String::from).collect(),
            found: Arc::default(),
            log: log.clone(),
        }))
    }

    fn changesets(
        &self,
        _settings: &Settings,
        _log: &RunLog,
        revisions: &Arc<FileScan>,
    ) -> Result<Arc<DirectoryChangesets>, StageError> {
        Ok(Arc::new(DirectoryChangesets {
            found: revisions.found.clone(),
            dirs: Arc::default(),
        }))
    }

    fn exporter(
        &self,
        settings: &Settings,
        log: &RunLog,
        _revisions: &Arc<FileScan>,
        changesets: &Arc<DirectoryChangesets>,
    ) -> Result<WorkRef, StageError> {
        let target = PathBuf::from(&settings.git_directory);
        let ignore_errors = settings.ignore_git_errors;
        let dirs = changesets.dirs.clone();
        let log = log.clone();
        Ok(WorkFn::arc("exporter", move |ctx: WorkContext| {
            let (target, dirs, log) = (target.clone(), dirs.clone(), log.clone());
            async move {
                ctx.set_status(format!("writing {}", target.display()));
                let listing = dirs
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(|d| format!("{}\n", d.display()))
                    .collect::<String>();
                let written = async {
                    tokio::fs::create_dir_all(&target).await?;
                    tokio::fs::write(target.join("CHANGESETS.txt"), listing).await
                }
                .await;
                match written {
                    Ok(()) => Ok(()),
                    Err(e) if ignore_errors => {
                        log.write_line(format_args!("Ignoring export error: {e}"));
                        Ok(())
                    }
                    Err(e) => Err(WorkError::fail(format!("{}: {e}", target.display()))),
                }
            }
        }))
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = Settings::load(&args.settings)?;

    let subs: Vec<Arc<dyn Subscribe>> = if args.events {
        vec![Arc::new(LogWriter::new())]
    } else {
        Vec::new()
    };
    let orch = Orchestrator::new(Simulated).with_subscribers(subs);
    orch.start(settings)?;

    let grace = Duration::from_secs(args.grace_secs);
    let mut tick = tokio::time::interval(Duration::from_millis(args.poll_ms.max(1)));
    let signal = wait_for_shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let p = orch.progress();
                println!(
                    "[{:>6.1}s] files={} revisions={} changesets={} {}",
                    p.elapsed.as_secs_f64(),
                    p.files,
                    p.revisions,
                    p.changesets,
                    p.status.as_deref().unwrap_or("")
                );
                for failure in orch.drain_exceptions() {
                    eprintln!("ERROR: {failure}");
                }
                if p.idle {
                    break;
                }
            }
            res = &mut signal => {
                if let Err(e) = res {
                    warn!(error = %e, "signal handler unavailable");
                }
                info!("abort requested");
                if let Err(e) = orch.shutdown(grace).await {
                    warn!(error = %e, "stages still running at exit");
                }
                break;
            }
        }
    }

    for failure in orch.drain_exceptions() {
        eprintln!("ERROR: {failure}");
    }
    let p = orch.progress();
    println!(
        "done in {:.1}s: {} files, {} revisions, {} changesets",
        p.elapsed.as_secs_f64(),
        p.files,
        p.revisions,
        p.changesets
    );
    orch.release_stages();
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<SettingsError>() {
        return if e.is_not_found() {
            EXIT_NOT_FOUND
        } else {
            EXIT_INVALID_SETTINGS
        };
    }
    match err.downcast_ref::<StartError>() {
        Some(StartError::InvalidSettings(_)) => EXIT_INVALID_SETTINGS,
        _ => EXIT_UNKNOWN,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            if let Some(SettingsError::Invalid(issues)) = e.downcast_ref::<SettingsError>() {
                for issue in issues {
                    eprintln!("  - {issue}");
                }
            }
            ExitCode::from(exit_code(&e))
        }
    }
}
