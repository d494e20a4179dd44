//! Upload benchmark: a pre-filled queue of local files drained by N workers, each holding a
//! transfer session, with a reporter logging queue depth and uploads in flight.

pub mod transfer;

#[cfg(feature = "sftp")]
pub mod sftp;

pub use transfer::{FileTransfer, TransferSession};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, bounded};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::RunState;
use crate::engine::tools::{path_relative_to, path_to_remote_string};
use crate::utils::CancelFlag;

/// Reporter wake-up granularity while waiting for the next interval.
const REPORT_TICK: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct BenchOpts {
    pub source: PathBuf,
    /// Remote folder the source tree is uploaded under.
    pub target: String,
    pub threads: usize,
    pub recursive: bool,
    /// Open a new connection for every file instead of one per worker.
    pub connect_per_file: bool,
    pub report_interval: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct BenchReport {
    pub state: RunState,
    pub files_total: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub bytes: u64,
    pub connections: usize,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn files_per_sec(&self) -> f64 {
        self.uploaded as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    pub fn mib_per_sec(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0) / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

/// Counters and caches shared by the workers and the reporter.
#[derive(Default)]
struct BenchShared {
    uploading: AtomicUsize,
    uploaded: AtomicUsize,
    failed: AtomicUsize,
    bytes: AtomicU64,
    connections: AtomicUsize,
    workers_done: AtomicUsize,
    /// Remote directories known to exist.
    known_dirs: Mutex<HashSet<String>>,
}

/// Regular files under `root`: top level only, or the whole tree when `recursive`. Sorted.
pub fn enumerate_sources(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Source folder {} does not exist or is not a directory", root.display());
    }
    let mut walker = WalkDir::new(root).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }
    let mut files = Vec::new();
    for entry_result in walker {
        match entry_result {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(err) => warn!("Skipping unreadable path: {}", err),
        }
    }
    files.sort();
    Ok(files)
}

/// Remote directory for `file`: `target` joined with the file's parent relative to `source_root`,
/// always `/`-separated.
pub fn remote_dir_for(source_root: &Path, target: &str, file: &Path) -> String {
    let rel_parent = path_relative_to(file, source_root)
        .and_then(|rel| rel.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let rel = path_to_remote_string(&rel_parent);
    let target = target.trim_end_matches('/');
    match (target.is_empty(), rel.is_empty()) {
        (_, true) => target.to_string(),
        (true, false) => rel,
        (false, false) => format!("{target}/{rel}"),
    }
}

/// Make sure every cumulative segment of `dir` exists. A create that fails because another
/// worker got there first is not an error.
fn ensure_remote_dir<S: TransferSession>(
    session: &mut S,
    dir: &str,
    known: &Mutex<HashSet<String>>,
) -> Result<()> {
    let mut current = String::new();
    if dir.starts_with('/') {
        current.push('/');
    }
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);

        if known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&current)
        {
            continue;
        }
        if !session.exists(&current)?
            && let Err(e) = session.create_dir(&current)
            && !session.exists(&current)?
        {
            return Err(e);
        }
        known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(current.clone());
    }
    Ok(())
}

/// Upload one file, reusing `session` when present. On success the session is put back.
fn upload_one<T: FileTransfer>(
    transfer: &T,
    session: &mut Option<T::Session>,
    opts: &BenchOpts,
    shared: &BenchShared,
    path: &Path,
) -> Result<u64> {
    let mut sess = match session.take() {
        Some(s) => s,
        None => {
            let s = transfer.connect()?;
            shared.connections.fetch_add(1, Ordering::Relaxed);
            s
        }
    };
    let dir = remote_dir_for(&opts.source, &opts.target, path);
    ensure_remote_dir(&mut sess, &dir, &shared.known_dirs)?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("non UTF-8 file name: {}", path.display()))?;
    let remote = if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    };
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let bytes = sess.upload(&mut file, &remote)?;
    *session = Some(sess);
    Ok(bytes)
}

/// Counts the worker as finished when dropped, including on unwind, so the reporter loop ends.
struct WorkerDone<'a>(&'a AtomicUsize);

impl Drop for WorkerDone<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn run_worker<T: FileTransfer>(
    transfer: &T,
    queue: &Receiver<PathBuf>,
    opts: &BenchOpts,
    shared: &BenchShared,
    cancel: &CancelFlag,
) {
    let _done = WorkerDone(&shared.workers_done);
    let mut session: Option<T::Session> = None;
    while let Ok(path) = queue.try_recv() {
        if cancel.is_cancelled() {
            break;
        }
        shared.uploading.fetch_add(1, Ordering::SeqCst);
        let result = upload_one(transfer, &mut session, opts, shared, &path);
        shared.uploading.fetch_sub(1, Ordering::SeqCst);
        match result {
            Ok(bytes) => {
                shared.uploaded.fetch_add(1, Ordering::Relaxed);
                shared.bytes.fetch_add(bytes, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Upload of {} failed: {:#}", path.display(), e);
                shared.failed.fetch_add(1, Ordering::Relaxed);
                // Failed sessions are not reused; the next file reconnects.
                session = None;
            }
        }
        if opts.connect_per_file {
            session = None;
        }
    }
}

/// Upload every source file with `opts.threads` workers and report throughput.
pub fn run_upload_bench<T: FileTransfer>(
    transfer: &T,
    opts: &BenchOpts,
    cancel: &CancelFlag,
) -> Result<BenchReport> {
    let files = enumerate_sources(&opts.source, opts.recursive)?;
    if files.is_empty() {
        warn!("No files found in {}", opts.source.display());
        return Ok(BenchReport {
            state: RunState::Completed,
            ..BenchReport::default()
        });
    }
    let files_total = files.len();
    let workers = opts.threads.max(1).min(files_total);
    info!(
        "Uploading {} files from {} to {} with {} workers",
        files_total,
        opts.source.display(),
        opts.target,
        workers
    );

    let (tx, rx) = bounded::<PathBuf>(files_total);
    for f in files {
        tx.send(f).context("fill upload queue")?;
    }
    drop(tx);

    let shared = BenchShared::default();
    let started = Instant::now();
    thread::scope(|s| {
        for _ in 0..workers {
            let rx = &rx;
            let shared = &shared;
            s.spawn(move || run_worker(transfer, rx, opts, shared, cancel));
        }

        let mut last_report = Instant::now();
        while shared.workers_done.load(Ordering::SeqCst) < workers {
            thread::sleep(REPORT_TICK);
            if last_report.elapsed() >= opts.report_interval {
                last_report = Instant::now();
                info!(
                    "{}s: Queue: {}, Uploading: {}",
                    started.elapsed().as_secs(),
                    rx.len(),
                    shared.uploading.load(Ordering::SeqCst)
                );
            }
        }
    });

    let uploaded = shared.uploaded.load(Ordering::Relaxed);
    let failed = shared.failed.load(Ordering::Relaxed);
    let aborted = cancel.is_cancelled() || (uploaded == 0 && failed > 0);
    let report = BenchReport {
        state: RunState::finish(aborted),
        files_total,
        uploaded,
        failed,
        bytes: shared.bytes.load(Ordering::Relaxed),
        connections: shared.connections.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
    };
    debug!("bench: {:?}", report);

    if report.state == RunState::Aborted {
        warn!(
            "Upload benchmark aborted: {} of {} files uploaded, {} failed",
            report.uploaded, report.files_total, report.failed
        );
    } else {
        info!(
            "Uploaded {} of {} files ({} bytes, {} errors) in {:.2} seconds",
            report.uploaded,
            report.files_total,
            report.bytes,
            report.failed,
            report.elapsed.as_secs_f64()
        );
    }
    info!(
        "Throughput: {:.2} files/s, {:.2} MiB/s over {} connections",
        report.files_per_sec(),
        report.mib_per_sec(),
        report.connections
    );
    Ok(report)
}
