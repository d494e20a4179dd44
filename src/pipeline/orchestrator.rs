use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::thread;
use std::time::Instant;

use crate::pipeline::{
    self, BatchWriter, ExportChannels, ExportReport, log_export_summary, run_producer, run_writer,
};
use crate::storage::{TagQuery, TagStore};
use crate::utils::CancelFlag;
use crate::utils::config::DataFiles;
use crate::{ExportOpts, RunState};

/// Create the output folder and warn when it already holds data files (new rows continue after them).
pub fn prepare_output_folder(folder: &Path, prefix: &str) -> Result<()> {
    std::fs::create_dir_all(folder)
        .with_context(|| format!("create output folder {}", folder.display()))?;
    let existing = std::fs::read_dir(folder)
        .with_context(|| format!("read output folder {}", folder.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| DataFiles::index_of(prefix, n).is_some())
        })
        .count();
    if existing > 0 {
        warn!(
            "{} already holds {} data files; new rows continue after existing files",
            folder.display(),
            existing
        );
    }
    Ok(())
}

/// Main orchestrator for export: producer on this thread, writer on its own thread,
/// joined by a bounded queue. Page → batch channel → writer → data files.
///
/// Returns `Ok` with an `Aborted` report when enumeration or writing failed part-way;
/// `Err` only for setup failures (output folder).
pub fn run_export<S>(store: &S, opts: &ExportOpts, cancel: &CancelFlag) -> Result<ExportReport>
where
    S: TagStore + ?Sized,
{
    prepare_output_folder(&opts.folder, &opts.file_prefix)?;

    info!("Starting export operation...");
    info!("Using tag filter: {}", opts.tag_filter);
    if let Some(c) = &opts.container {
        info!("Restricted to container: {}", c);
    }
    debug!("export: {:?} -> {:?}", RunState::Idle, RunState::Running);

    let query = TagQuery {
        filter: opts.tag_filter.clone(),
        container: opts.container.clone(),
        page_size: opts.page_size,
    };
    let ExportChannels { batch_tx, batch_rx } =
        pipeline::create_export_channels(opts.queue_capacity);
    let writer = BatchWriter::open(&opts.folder, &opts.file_prefix, opts.rows_per_file)
        .with_context(|| format!("scan data files in {}", opts.folder.display()))?;

    let started = Instant::now();
    let (producer, writer_report) = thread::scope(|s| {
        let writer_handle = s.spawn(move || run_writer(batch_rx, writer, cancel));
        let producer = run_producer(store, &query, batch_tx, cancel);
        info!("Waiting for file writer to complete...");
        (producer, writer_handle.join())
    });
    let writer = writer_report.map_err(|_| anyhow::anyhow!("file writer thread panicked"))?;

    let aborted = producer.cancelled
        || producer.error.is_some()
        || writer.cancelled
        || writer.error.is_some();
    let report = ExportReport {
        state: RunState::finish(aborted),
        producer,
        writer,
        elapsed: started.elapsed(),
    };
    debug!("export: {:?} -> {:?}", RunState::Running, report.state);

    log_export_summary(&report);
    Ok(report)
}
