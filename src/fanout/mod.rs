//! Set path: read data files back and re-apply tags to every listed blob.

pub mod files;
pub mod worker;

pub use files::{LineOutcome, list_data_files, load_work_item, parse_target_line, partition_files};
pub use worker::{FileOutcome, InFlight, InFlightGuard, SetStats, apply_work_item};

use anyhow::Result;
use kdam::Animation;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::progress::{
    ProgressBar, ProgressBarConfig, create_progress_bar, update_progress_bar,
};
use crate::storage::TagStore;
use crate::utils::CancelFlag;
use crate::utils::config::FanOutConsts;
use crate::{RunState, SetOpts};

/// Reporter wake-up granularity while waiting for the next interval.
const REPORT_TICK: Duration = Duration::from_millis(50);

/// Totals for one set run.
#[derive(Clone, Debug, Default)]
pub struct SetReport {
    pub state: RunState,
    pub files_found: usize,
    pub files_processed: usize,
    pub file_errors: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub peak_in_flight: usize,
    /// Failed updates grouped by error message, most frequent first.
    pub errors: Vec<(String, usize)>,
    pub elapsed: Duration,
}

fn shorten(msg: &str, max_chars: usize) -> String {
    if msg.chars().count() <= max_chars {
        return msg.to_string();
    }
    let mut short: String = msg.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

/// Interval progress line: totals, overall and current rate, top errors.
/// Returns the updated count so the next call can compute the current rate.
fn log_progress(
    stats: &SetStats,
    started: Instant,
    since_last: Duration,
    last_updated: usize,
) -> usize {
    let updated = stats.updated.load(Ordering::Relaxed);
    let failed = stats.failed.load(Ordering::Relaxed);
    info!(
        "Progress: {} completed, {} errors, {:.2} req/sec (current: {:.2} req/sec)",
        updated,
        failed,
        updated as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON),
        updated.saturating_sub(last_updated) as f64 / since_last.as_secs_f64().max(f64::EPSILON)
    );
    if failed > 0 {
        info!("Top errors:");
        for (msg, count) in stats.error_summary().iter().take(FanOutConsts::TOP_ERRORS) {
            info!(
                "  [{} occurrences] {}",
                count,
                shorten(msg, FanOutConsts::TOP_ERROR_DISPLAY_CHARS)
            );
        }
    }
    updated
}

/// Process one partition's files in order.
fn run_partition<S>(
    store: &S,
    group: &[PathBuf],
    opts: &SetOpts,
    stats: &SetStats,
    cancel: &CancelFlag,
    pb: Option<&ProgressBar>,
) where
    S: TagStore + ?Sized,
{
    for path in group {
        if cancel.is_cancelled() {
            break;
        }
        let item = match load_work_item(path) {
            Ok(item) => item,
            Err(e) => {
                error!("Error reading file {}: {}", path.display(), e);
                stats.file_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };
        debug!(
            "Processing {} ({} targets, {} skipped)",
            path.display(),
            item.targets.len(),
            item.skipped
        );
        let outcome = apply_work_item(store, &item, &opts.tags, opts.max_in_flight, stats, cancel);
        if outcome.not_started > 0 {
            warn!(
                "{}: {} updates not started (cancelled)",
                path.display(),
                outcome.not_started
            );
        } else {
            stats.files_done.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(pb) = pb {
            update_progress_bar(pb, 1);
        }
    }
}

/// Main entry for set: list data files, split them into partitions, one thread per partition.
pub fn run_set_tags<S>(store: &S, opts: &SetOpts, cancel: &CancelFlag) -> Result<SetReport>
where
    S: TagStore + ?Sized,
{
    info!("Starting set operation...");
    let started = Instant::now();
    let files = list_data_files(&opts.folder, &opts.file_prefix)?;
    if files.is_empty() {
        warn!("No data files found in the specified folder.");
        return Ok(SetReport {
            state: RunState::Completed,
            elapsed: started.elapsed(),
            ..SetReport::default()
        });
    }
    info!("Found {} files to process.", files.len());

    let groups = partition_files(&files, opts.partitions);
    info!(
        "Processing in {} partitions of up to {} files, {} updates in flight per file",
        groups.len(),
        groups.first().map_or(0, Vec::len),
        opts.max_in_flight
    );

    let stats = SetStats::default();
    let pb = opts.verbose.then(|| {
        create_progress_bar(ProgressBarConfig::new(
            files.len(),
            "Setting tags",
            Animation::Classic,
        ))
    });

    thread::scope(|s| {
        let handles: Vec<_> = groups
            .iter()
            .map(|group| {
                let stats = &stats;
                let pb = pb.as_ref();
                s.spawn(move || run_partition(store, group, opts, stats, cancel, pb))
            })
            .collect();

        let mut last_report = Instant::now();
        let mut last_updated = 0;
        while handles.iter().any(|h| !h.is_finished()) {
            thread::sleep(REPORT_TICK);
            let since_last = last_report.elapsed();
            if since_last >= opts.report_interval {
                last_updated = log_progress(&stats, started, since_last, last_updated);
                last_report = Instant::now();
            }
        }
    });

    let report = SetReport {
        state: RunState::finish(cancel.is_cancelled()),
        files_found: files.len(),
        files_processed: stats.files_done.load(Ordering::Relaxed),
        file_errors: stats.file_errors.load(Ordering::Relaxed),
        updated: stats.updated.load(Ordering::Relaxed),
        failed: stats.failed.load(Ordering::Relaxed),
        skipped: stats.skipped.load(Ordering::Relaxed),
        peak_in_flight: stats.in_flight.peak(),
        errors: stats.error_summary(),
        elapsed: started.elapsed(),
    };

    if report.state == RunState::Aborted {
        warn!("Set operation cancelled.");
    } else {
        info!("Set operation completed.");
    }
    info!(
        "Files: {} processed, {} unreadable. Tags: {} updated, {} failed, {} malformed lines skipped",
        report.files_processed, report.file_errors, report.updated, report.failed, report.skipped
    );
    info!(
        "Peak in-flight updates: {}, elapsed {:.2} seconds ({:.2} req/sec)",
        report.peak_in_flight,
        report.elapsed.as_secs_f64(),
        report.updated as f64 / report.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    if !report.errors.is_empty() {
        warn!("Error summary by type:");
        for (msg, count) in &report.errors {
            warn!("  [{} occurrences] {}", count, msg);
        }
    }
    Ok(report)
}
