//! Per-file fan-out: a fixed pool of `min(cap, targets)` workers draining a bounded channel.

use crossbeam_channel::bounded;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::storage::TagStore;
use crate::utils::CancelFlag;
use crate::utils::config::FanOutConsts;
use crate::{BlobRef, Tags, WorkItem};

/// Current and peak number of tag updates in flight.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Decrements the gauge when dropped.
pub struct InFlightGuard<'a> {
    gauge: &'a InFlight,
}

impl InFlight {
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counters shared by every partition thread of one set run. Updated per call, so the
/// progress reporter sees live totals.
#[derive(Debug, Default)]
pub struct SetStats {
    pub updated: AtomicUsize,
    pub failed: AtomicUsize,
    pub skipped: AtomicUsize,
    pub files_done: AtomicUsize,
    pub file_errors: AtomicUsize,
    pub in_flight: InFlight,
    /// Failed update count per error message (first `ERROR_KEY_CHARS` characters).
    errors: Mutex<HashMap<String, usize>>,
}

impl SetStats {
    pub fn record_error(&self, message: &str) {
        let key: String = message.chars().take(FanOutConsts::ERROR_KEY_CHARS).collect();
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        *errors.entry(key).or_default() += 1;
    }

    /// Error messages with their counts, most frequent first (ties by message).
    pub fn error_summary(&self) -> Vec<(String, usize)> {
        let mut summary: Vec<(String, usize)> = self
            .errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(msg, count)| (msg.clone(), *count))
            .collect();
        summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        summary
    }
}

/// How one file went.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileOutcome {
    pub updated: usize,
    pub failed: usize,
    /// Targets never admitted because the run was cancelled.
    pub not_started: usize,
}

/// Apply `tags` to every target of `item` with at most `max_in_flight` concurrent calls.
/// Cancellation stops admission; calls already handed to a worker complete.
pub fn apply_work_item<S>(
    store: &S,
    item: &WorkItem,
    tags: &Tags,
    max_in_flight: usize,
    stats: &SetStats,
    cancel: &CancelFlag,
) -> FileOutcome
where
    S: TagStore + ?Sized,
{
    stats.skipped.fetch_add(item.skipped, Ordering::Relaxed);
    if item.targets.is_empty() {
        return FileOutcome::default();
    }

    let workers = max_in_flight.max(1).min(item.targets.len());
    let updated = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let (tx, rx) = bounded::<&BlobRef>(workers);

    let admitted = thread::scope(|s| {
        for _ in 0..workers {
            let rx = rx.clone();
            let updated = &updated;
            let failed = &failed;
            s.spawn(move || {
                for blob in rx.iter() {
                    let _guard = stats.in_flight.enter();
                    match store.set_tags(blob, tags) {
                        Ok(()) => {
                            updated.fetch_add(1, Ordering::Relaxed);
                            stats.updated.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!("Error setting tags for blob {}: {}", blob, e);
                            stats.record_error(&e.to_string());
                            failed.fetch_add(1, Ordering::Relaxed);
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
        drop(rx);

        let mut admitted = 0;
        for blob in &item.targets {
            if cancel.is_cancelled() {
                debug!(
                    "{}: cancelled after admitting {} of {} updates",
                    item.path.display(),
                    admitted,
                    item.targets.len()
                );
                break;
            }
            if tx.send(blob).is_err() {
                break;
            }
            admitted += 1;
        }
        drop(tx);
        admitted
    });

    FileOutcome {
        updated: updated.into_inner(),
        failed: failed.into_inner(),
        not_started: item.targets.len() - admitted,
    }
}
