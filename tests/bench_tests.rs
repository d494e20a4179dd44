use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use tagsweep::RunState;
use tagsweep::bench::{
    BenchOpts, FileTransfer, TransferSession, enumerate_sources, remote_dir_for, run_upload_bench,
};
use tagsweep::utils::CancelFlag;

// --- in-memory transfer ---

#[derive(Default)]
struct Remote {
    dirs: Mutex<HashSet<String>>,
    files: Mutex<HashMap<String, u64>>,
}

#[derive(Default)]
struct FakeTransfer {
    remote: Arc<Remote>,
    connects: AtomicUsize,
    refuse_connections: bool,
    /// Uploads to a remote path ending with this panic.
    panic_on: Option<String>,
}

struct FakeSession {
    remote: Arc<Remote>,
    panic_on: Option<String>,
}

impl FileTransfer for FakeTransfer {
    type Session = FakeSession;

    fn connect(&self) -> Result<FakeSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connections {
            bail!("connection refused");
        }
        Ok(FakeSession {
            remote: Arc::clone(&self.remote),
            panic_on: self.panic_on.clone(),
        })
    }
}

impl TransferSession for FakeSession {
    fn exists(&mut self, remote_path: &str) -> Result<bool> {
        Ok(self.remote.dirs.lock().unwrap().contains(remote_path)
            || self.remote.files.lock().unwrap().contains_key(remote_path))
    }

    fn create_dir(&mut self, remote_path: &str) -> Result<()> {
        let mut dirs = self.remote.dirs.lock().unwrap();
        if dirs.contains(remote_path) {
            bail!("{remote_path} already exists");
        }
        if let Some((parent, _)) = remote_path.rsplit_once('/')
            && !parent.is_empty()
            && !dirs.contains(parent)
        {
            bail!("parent of {remote_path} missing");
        }
        dirs.insert(remote_path.to_string());
        Ok(())
    }

    fn upload(&mut self, src: &mut dyn Read, remote_path: &str) -> Result<u64> {
        if let Some(name) = &self.panic_on
            && remote_path.ends_with(name.as_str())
        {
            panic!("upload of {remote_path} blew up");
        }
        let mut buf = Vec::new();
        let n = src.read_to_end(&mut buf)? as u64;
        self.remote
            .files
            .lock()
            .unwrap()
            .insert(remote_path.to_string(), n);
        Ok(n)
    }
}

fn source_tree(root: &Path) {
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("b.txt"), "bravo!").unwrap();
    fs::create_dir_all(root.join("sub").join("deeper")).unwrap();
    fs::write(root.join("sub").join("c.txt"), "c").unwrap();
    fs::write(root.join("sub").join("deeper").join("d.txt"), "delta").unwrap();
}

fn bench_opts(source: &Path, recursive: bool, connect_per_file: bool) -> BenchOpts {
    BenchOpts {
        source: source.to_path_buf(),
        target: "bench".to_string(),
        threads: 3,
        recursive,
        connect_per_file,
        report_interval: Duration::from_millis(10),
    }
}

// --- enumerate_sources ---

#[test]
fn test_enumerate_sources_top_level() {
    let dir = tempfile::tempdir().unwrap();
    source_tree(dir.path());
    let files = enumerate_sources(dir.path(), false).unwrap();
    assert_eq!(files, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);
}

#[test]
fn test_enumerate_sources_recursive() {
    let dir = tempfile::tempdir().unwrap();
    source_tree(dir.path());
    let files = enumerate_sources(dir.path(), true).unwrap();
    assert_eq!(files.len(), 4);
    assert!(files.contains(&dir.path().join("sub").join("deeper").join("d.txt")));
}

#[test]
fn test_enumerate_sources_missing_root() {
    let dir = tempfile::tempdir().unwrap();
    assert!(enumerate_sources(&dir.path().join("missing"), false).is_err());
}

// --- remote_dir_for ---

#[test]
fn test_remote_dir_for() {
    let root = Path::new("/src");
    assert_eq!(
        remote_dir_for(root, "bench", Path::new("/src/a/b/f.txt")),
        "bench/a/b"
    );
    assert_eq!(remote_dir_for(root, "bench", Path::new("/src/f.txt")), "bench");
    assert_eq!(remote_dir_for(root, "bench/", Path::new("/src/f.txt")), "bench");
    assert_eq!(remote_dir_for(root, "", Path::new("/src/a/f.txt")), "a");
}

// --- run_upload_bench ---

#[test]
fn test_bench_uploads_tree_with_session_reuse() {
    let dir = tempfile::tempdir().unwrap();
    source_tree(dir.path());
    let transfer = FakeTransfer::default();
    let report =
        run_upload_bench(&transfer, &bench_opts(dir.path(), true, false), &CancelFlag::new())
            .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.files_total, 4);
    assert_eq!(report.uploaded, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(report.bytes, 5 + 6 + 1 + 5);
    assert!(report.connections <= 3);

    let files = transfer.remote.files.lock().unwrap();
    for path in ["bench/a.txt", "bench/b.txt", "bench/sub/c.txt", "bench/sub/deeper/d.txt"] {
        assert!(files.contains_key(path), "missing {path}");
    }
    let dirs = transfer.remote.dirs.lock().unwrap();
    assert!(dirs.contains("bench/sub/deeper"));
}

#[test]
fn test_bench_connect_per_file() {
    let dir = tempfile::tempdir().unwrap();
    source_tree(dir.path());
    let transfer = FakeTransfer::default();
    let report =
        run_upload_bench(&transfer, &bench_opts(dir.path(), true, true), &CancelFlag::new())
            .unwrap();
    assert_eq!(report.uploaded, 4);
    assert_eq!(report.connections, 4);
    assert_eq!(transfer.connects.load(Ordering::SeqCst), 4);
}

#[test]
fn test_bench_all_connections_refused() {
    let dir = tempfile::tempdir().unwrap();
    source_tree(dir.path());
    let transfer = FakeTransfer {
        refuse_connections: true,
        ..FakeTransfer::default()
    };
    let report =
        run_upload_bench(&transfer, &bench_opts(dir.path(), false, false), &CancelFlag::new())
            .unwrap();
    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.failed, 2);
    // No session survives a failure, so every file tries its own connection.
    assert_eq!(transfer.connects.load(Ordering::SeqCst), 2);
}

#[test]
fn test_bench_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    source_tree(dir.path());
    let transfer = FakeTransfer::default();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = run_upload_bench(&transfer, &bench_opts(dir.path(), true, false), &cancel).unwrap();
    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.uploaded, 0);
    assert!(transfer.remote.files.lock().unwrap().is_empty());
}

#[test]
fn test_bench_empty_source() {
    let dir = tempfile::tempdir().unwrap();
    let transfer = FakeTransfer::default();
    let report =
        run_upload_bench(&transfer, &bench_opts(dir.path(), true, false), &CancelFlag::new())
            .unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.files_total, 0);
    assert_eq!(transfer.connects.load(Ordering::SeqCst), 0);
}

#[test]
fn test_bench_worker_panic_does_not_hang_reporter() {
    let dir = tempfile::tempdir().unwrap();
    source_tree(dir.path());
    let source = dir.path().to_path_buf();

    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let transfer = FakeTransfer {
            panic_on: Some("b.txt".to_string()),
            ..FakeTransfer::default()
        };
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_upload_bench(&transfer, &bench_opts(&source, true, false), &CancelFlag::new())
        }));
        let _ = done_tx.send(outcome.is_err());
    });

    // The scope re-raises the worker panic once every thread has finished.
    let panicked = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("benchmark hung after a worker panicked");
    assert!(panicked);
}
